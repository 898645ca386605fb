use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Which of the four AVL imbalance shapes a rotation repaired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rebalance {
    LeftLeft,
    RightRight,
    LeftRight,
    RightLeft,
}

impl fmt::Display for Rebalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rebalance::LeftLeft => "left-left",
            Rebalance::RightRight => "right-right",
            Rebalance::LeftRight => "left-right",
            Rebalance::RightLeft => "right-left",
        };
        f.write_str(name)
    }
}

/// Cloneable string sink. Hand one clone to a tree as its debug writer and
/// keep the other to read back what was written.
#[derive(Clone, Default)]
pub struct SharedTrace(Rc<RefCell<String>>);

impl fmt::Write for SharedTrace {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.borrow_mut().push_str(s);
        Ok(())
    }
}

impl SharedTrace {
    pub fn new() -> Self {
        SharedTrace(Rc::new(RefCell::new(String::new())))
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, String> {
        self.0.borrow()
    }

    /// Drain everything written so far.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().lines().map(str::to_owned).collect()
    }
}
