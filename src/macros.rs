//! Call-site macros for test bodies.
//!
//! Each macro captures the source location with [`here!`](crate::here) and
//! the expression text with `stringify!`. The context argument must be a
//! place expression (usually the `ctx` parameter of the body); it is named
//! more than once in the expansion.
//!
//! ```rust,ignore
//! test_case!(registry, "vectors can be sized and resized", "[vector]", |ctx| {
//!     let mut v = vec![0; 5];
//!     require!(ctx, v.len() == 5)?;
//!
//!     section!(ctx, "resizing bigger changes size", |ctx| {
//!         v.resize(10, 0);
//!         check!(ctx, v.len() == 10);
//!         Ok(())
//!     })?;
//!     Ok(())
//! })?;
//! ```

/// Runs the body only in the pass that enters this section.
#[macro_export]
macro_rules! section {
    ($ctx:expr, $name:expr, $body:expr $(,)?) => {
        $ctx.section(
            $crate::reporter::SectionInfo::new($name, $crate::here!()),
            $body,
        )
    };
    ($ctx:expr, $name:expr, $description:expr, $body:expr $(,)?) => {
        $ctx.section(
            $crate::reporter::SectionInfo::new($name, $crate::here!())
                .with_description($description),
            $body,
        )
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __assert_expr {
    ($ctx:expr, $macro_name:expr, $disposition:ident, $cond:expr) => {{
        $ctx.begin_assertion($crate::assertion::AssertionInfo::new(
            $macro_name,
            $crate::here!(),
            stringify!($cond),
            $crate::assertion::Disposition::$disposition,
        ));
        let value: bool = $cond;
        (value, $ctx.conclude(value, String::new()))
    }};
}

/// Records `cond`; evaluates to whether it held. Never interrupts.
#[macro_export]
macro_rules! check {
    ($ctx:expr, $cond:expr $(,)?) => {
        $crate::__assert_expr!($ctx, "CHECK", ContinueOnFailure, $cond).0
    };
}

/// Records `cond`; evaluates to a `TestResult` that is `Err` when it failed.
#[macro_export]
macro_rules! require {
    ($ctx:expr, $cond:expr $(,)?) => {
        $crate::__assert_expr!($ctx, "REQUIRE", Normal, $cond).1
    };
}

#[macro_export]
macro_rules! check_false {
    ($ctx:expr, $cond:expr $(,)?) => {
        !$crate::__assert_expr!($ctx, "CHECK_FALSE", FalseIsOkContinue, $cond).0
    };
}

#[macro_export]
macro_rules! require_false {
    ($ctx:expr, $cond:expr $(,)?) => {
        $crate::__assert_expr!($ctx, "REQUIRE_FALSE", FalseIsOk, $cond).1
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __assert_eq {
    ($ctx:expr, $macro_name:expr, $disposition:ident, $left:expr, $right:expr) => {{
        $ctx.begin_assertion($crate::assertion::AssertionInfo::new(
            $macro_name,
            $crate::here!(),
            concat!(stringify!($left), " == ", stringify!($right)),
            $crate::assertion::Disposition::$disposition,
        ));
        match (&$left, &$right) {
            (left, right) => {
                let value = *left == *right;
                (value, $ctx.conclude(value, format!("{:?} == {:?}", left, right)))
            }
        }
    }};
}

/// Like `check!(ctx, a == b)` but the outcome message shows both values.
#[macro_export]
macro_rules! check_eq {
    ($ctx:expr, $left:expr, $right:expr $(,)?) => {
        $crate::__assert_eq!($ctx, "CHECK_EQ", ContinueOnFailure, $left, $right).0
    };
}

#[macro_export]
macro_rules! require_eq {
    ($ctx:expr, $left:expr, $right:expr $(,)?) => {
        $crate::__assert_eq!($ctx, "REQUIRE_EQ", Normal, $left, $right).1
    };
}

/// One value per generator combination: `let x = generate!(ctx, [1, 2, 3])?;`
#[macro_export]
macro_rules! generate {
    ($ctx:expr, [$($value:expr),+ $(,)?]) => {
        $ctx.generate($crate::here!(), &[$($value),+])
    };
}

/// Explicit failure that leaves the current scope: `fail!(ctx, "bad {}", x)?;`
#[macro_export]
macro_rules! fail {
    ($ctx:expr, $($arg:tt)+) => {
        $ctx.fail($crate::here!(), format!($($arg)+))
    };
}

#[macro_export]
macro_rules! fail_check {
    ($ctx:expr, $($arg:tt)+) => {
        $ctx.fail_check($crate::here!(), format!($($arg)+))
    };
}

#[macro_export]
macro_rules! succeed {
    ($ctx:expr) => {
        $ctx.succeed($crate::here!(), String::new())
    };
    ($ctx:expr, $($arg:tt)+) => {
        $ctx.succeed($crate::here!(), format!($($arg)+))
    };
}
