/// Create a command: `cmd!(Put, key, value)` or `cmd!(Get, key)`.
#[macro_export]
#[allow(unused_macros)]
macro_rules! cmd {
    ($op:ident, $key:expr, $val:expr) => {
        $crate::Command::of($crate::Operation::$op, $key, $val)
    };

    ($op:ident, $key:expr) => {
        $crate::Command::of($crate::Operation::$op, $key, 0)
    };
}

#[macro_export]
#[allow(unused_macros)]
macro_rules! cmds {
    [$( ($op:ident $(, $arg:expr)*) ),* $(,)*] => {
        vec![$($crate::cmd!($op $(, $arg)*)),*]
    };
}

/// Create an instance.
///
/// Supported pattern:
/// inst!(instance_id, cmds, seq: seq, deps: deps)
/// inst!(instance_id, cmds, seq: seq, deps: deps, status: status)
///
/// Example:
/// ```
/// #[macro_use] extern crate smr;
/// use smr::*;
///
/// let inst = inst!((0, 1),
///            [(Put, 42, 1), (Get, 42)],
///            seq: 10,
///            deps: [NO_DEP, 3, 0],
///            status: Committed);
/// assert_eq!(10, inst.seq);
/// ```
#[macro_export]
#[allow(unused_macros)]
macro_rules! inst {
    ($id:expr,
     [$( ($op:ident $(, $arg:expr)*) ),* $(,)*],
     seq: $seq:expr,
     deps: [$($dep:expr),* $(,)*]
     $(,)*
    ) => {
        $crate::Instance::of(
            $id,
            &$crate::cmds![$( ($op $(, $arg)*) ),*],
            $seq,
            &[$($dep),*],
        )
    };

    ($id:expr,
     [$( ($op:ident $(, $arg:expr)*) ),* $(,)*],
     seq: $seq:expr,
     deps: [$($dep:expr),* $(,)*],
     status: $st:ident
     $(,)*
    ) => {
        $crate::Instance {
            status: $crate::InstanceStatus::$st,
            ..$crate::inst!($id, [$( ($op $(, $arg)*) ),*], seq: $seq, deps: [$($dep),*])
        }
    };
}
