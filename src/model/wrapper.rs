//! Translation between source positions and debuggee positions.
//!
//! Node compiles every CommonJS module inside a function wrapper. The
//! prologue shares line 0 with the first line of user code, so columns on
//! line 0 are shifted by the prologue length in everything the debuggee
//! reports and accepts. Lines are 0-based on the wire.

/// Text Node places in front of every module.
pub const SCRIPT_WRAP_BEGIN: &str = "(function (exports, require, module, __filename, __dirname) { ";

/// Text Node appends after every module.
pub const SCRIPT_WRAP_END: &str = "\n});";

/// Column shift applied on line 0.
pub const SCRIPT_WRAP_BEGIN_LEN: u32 = SCRIPT_WRAP_BEGIN.len() as u32;

/// Convert a user source position into the debuggee's coordinates.
pub fn to_debuggee_position(line: u32, column: u32) -> (u32, u32) {
    if line == 0 {
        (line, column.saturating_add(SCRIPT_WRAP_BEGIN_LEN))
    } else {
        (line, column)
    }
}

/// Convert a debuggee position back into user source coordinates.
pub fn from_debuggee_position(line: u32, column: u32) -> (u32, u32) {
    if line == 0 {
        (line, column.saturating_sub(SCRIPT_WRAP_BEGIN_LEN))
    } else {
        (line, column)
    }
}
