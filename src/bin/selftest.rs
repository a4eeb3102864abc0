// Self-test executable: a small registry exercising sections, generators and
// the failure tags. Usage: sectional-selftest [filters...] [options]

use tracing_subscriber::EnvFilter;

use sectional::prelude::*;
use sectional::EngineError;

fn register(registry: &mut TestRegistry) -> Result<(), EngineError> {
    test_case!(registry, "vectors can be sized and resized", "[vector]", |ctx| {
        let mut v = vec![0u8; 5];
        require!(ctx, v.len() == 5)?;
        require!(ctx, v.capacity() >= 5)?;

        section!(ctx, "resizing bigger changes size and capacity", |ctx| {
            v.resize(10, 0);
            check!(ctx, v.len() == 10);
            check!(ctx, v.capacity() >= 10);
            Ok(())
        })?;
        section!(ctx, "resizing smaller changes size but not capacity", |ctx| {
            v.truncate(0);
            check!(ctx, v.is_empty());
            check!(ctx, v.capacity() >= 5);
            Ok(())
        })?;
        section!(ctx, "reserving bigger changes capacity but not size", |ctx| {
            v.reserve(10);
            check_eq!(ctx, v.len(), 5);
            check!(ctx, v.capacity() >= 10);

            section!(ctx, "reserving smaller again does not change capacity", |ctx| {
                let before = v.capacity();
                v.reserve(1);
                check_eq!(ctx, v.capacity(), before);
                Ok(())
            })
        })
    })?;

    test_case!(registry, "generated values meet every section", "[generators]", |ctx| {
        let base = generate!(ctx, [1i64, 2, 3])?;
        section!(ctx, "doubling", |ctx| {
            check_eq!(ctx, base * 2, base + base);
            Ok(())
        })?;
        section!(ctx, "squaring", |ctx| {
            check!(ctx, base * base >= base);
            Ok(())
        })
    })?;

    test_case!(registry, "approximate comparisons", "[approx]", |ctx| {
        let third = 1.0_f64 / 3.0;
        check!(ctx, third == Approx::new(0.333_333_333));
        check!(ctx, third * 9.0 == Approx::new(3.0).epsilon(0.01));
        Ok(())
    })?;

    test_case!(registry, "tolerated failure", "[!mayfail]", |ctx| {
        check!(ctx, "left".len() == "right".len());
        Ok(())
    })?;

    test_case!(registry, "expected failure", "[!shouldfail]", |ctx| {
        require!(ctx, 1 + 1 == 3)
    })?;

    test_case!(registry, "deliberately failing", "[.failing]", |ctx| {
        section!(ctx, "one mismatch", |ctx| {
            check_eq!(ctx, 6 * 7, 41);
            Ok(())
        })
    })?;

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("SECTIONAL_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let mut registry = TestRegistry::new();
    if let Err(err) = register(&mut registry) {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(i32::MAX);
    }
    std::process::exit(sectional::cli::run(registry));
}
