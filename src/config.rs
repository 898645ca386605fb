/// Compile-time switches for an `AvlTree`.
pub trait ConfigT {
    /// Emit a line per rebalance through `debug!`.
    const DEBUG: bool;
    /// Run `validate` after every mutation and panic on a violation.
    const CHECK_INVARIANTS: bool;
}

#[derive(Debug, Clone, Copy)]
pub struct PlainConfig;

#[derive(Debug, Clone, Copy)]
pub struct PlainConfigDebug;

#[derive(Debug, Clone, Copy)]
pub struct CheckedConfig;

impl ConfigT for PlainConfig {
    const DEBUG: bool = false;
    const CHECK_INVARIANTS: bool = false;
}

impl ConfigT for PlainConfigDebug {
    const DEBUG: bool = true;
    const CHECK_INVARIANTS: bool = true;
}

impl ConfigT for CheckedConfig {
    const DEBUG: bool = false;
    const CHECK_INVARIANTS: bool = true;
}
