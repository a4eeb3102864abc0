// Section and generator walking, observed through the reporter event stream.

mod common;

use common::{config, run, Trail};
use sectional::assertion::ResultKind;
use sectional::prelude::*;
use sectional::reporters::Event;
use sectional::totals::Counts;

#[test]
fn each_leaf_takes_one_pass() {
    let mut registry = TestRegistry::new();
    let trail = Trail::default();
    let seen = trail.clone();
    test_case!(registry, "three leaves", move |ctx| {
        seen.push("body");
        for name in ["one", "two", "three"] {
            section!(ctx, name, |ctx| {
                seen.push(name);
                check!(ctx, !name.is_empty());
                Ok(())
            })?;
        }
        Ok(())
    })
    .unwrap();

    let (summary, log) = run(registry, config()).unwrap();
    assert_eq!(
        trail.entries(),
        vec!["body", "one", "body", "two", "body", "three"]
    );
    assert_eq!(summary.totals.assertions, Counts::new(3, 0, 0));
    assert_eq!(summary.totals.test_cases, Counts::new(1, 0, 0));
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(
        log.sections_entered(),
        vec!["three leaves", "one", "three leaves", "two", "three leaves", "three"]
    );
}

#[test]
fn nested_sections_rerun_their_parents() {
    let mut registry = TestRegistry::new();
    let trail = Trail::default();
    let seen = trail.clone();
    test_case!(registry, "vectors", "[vector]", move |ctx| {
        let mut v = vec![0u8; 5];
        require!(ctx, v.len() == 5)?;
        section!(ctx, "grow", |ctx| {
            v.resize(10, 0);
            section!(ctx, "then shrink", |ctx| {
                v.truncate(2);
                seen.push(format!("shrink:{}", v.len()));
                check!(ctx, v.len() == 2);
                Ok(())
            })?;
            section!(ctx, "then clear", |ctx| {
                v.clear();
                seen.push(format!("clear:{}", v.len()));
                check!(ctx, v.is_empty());
                Ok(())
            })
        })?;
        section!(ctx, "untouched", |ctx| {
            seen.push(format!("untouched:{}", v.len()));
            check!(ctx, v.len() == 5);
            Ok(())
        })
    })
    .unwrap();

    let (summary, _log) = run(registry, config()).unwrap();
    assert_eq!(
        trail.entries(),
        vec!["shrink:2", "clear:0", "untouched:5"]
    );
    // the precondition is checked once per pass
    assert_eq!(summary.totals.assertions, Counts::new(6, 0, 0));
}

#[test]
fn section_counts_add_up_to_the_test_totals() {
    let mut registry = TestRegistry::new();
    test_case!(registry, "mixed", |ctx| {
        check!(ctx, true);
        section!(ctx, "a", |ctx| {
            check!(ctx, true);
            check!(ctx, false);
            Ok(())
        })?;
        section!(ctx, "b", |ctx| {
            check!(ctx, true);
            Ok(())
        })
    })
    .unwrap();

    let (summary, log) = run(registry, config()).unwrap();
    let pass_totals = log
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Event::SectionEnded {
                name, assertions, ..
            } if name == "mixed" => Some(assertions),
            _ => None,
        })
        .fold(Counts::default(), |acc, counts| acc + counts);
    let test_totals = log.test_case_totals("mixed").unwrap();
    assert_eq!(pass_totals, test_totals.assertions);
    assert_eq!(test_totals.assertions, Counts::new(4, 1, 0));
    assert_eq!(summary.totals.assertions, test_totals.assertions);
    assert_eq!(summary.exit_code(), 1);
}

#[test]
fn generator_values_times_sections_give_every_leaf() {
    let mut registry = TestRegistry::new();
    let trail = Trail::default();
    let seen = trail.clone();
    test_case!(registry, "generated", move |ctx| {
        let word = generate!(ctx, ["a", "bb", "ccc"])?;
        section!(ctx, "length", |ctx| {
            seen.push(format!("{}/length", word));
            check!(ctx, !word.is_empty());
            Ok(())
        })?;
        section!(ctx, "upper", |ctx| {
            seen.push(format!("{}/upper", word));
            check_eq!(ctx, word.to_uppercase().len(), word.len());
            Ok(())
        })
    })
    .unwrap();

    let (summary, _log) = run(registry, config()).unwrap();
    assert_eq!(
        trail.entries(),
        vec![
            "a/length", "a/upper", "bb/length", "bb/upper", "ccc/length", "ccc/upper"
        ]
    );
    assert_eq!(summary.totals.assertions.passed, 6);
    assert_eq!(summary.totals.test_cases, Counts::new(1, 0, 0));
}

#[test]
fn generator_inside_a_section_is_scoped_to_it() {
    let mut registry = TestRegistry::new();
    let trail = Trail::default();
    let seen = trail.clone();
    test_case!(registry, "inner generator", move |ctx| {
        section!(ctx, "plain", |ctx| {
            seen.push("plain");
            check!(ctx, true);
            Ok(())
        })?;
        section!(ctx, "generated", |ctx| {
            let n = generate!(ctx, [10, 20])?;
            seen.push(format!("generated:{}", n));
            check!(ctx, n % 10 == 0);
            Ok(())
        })
    })
    .unwrap();

    run(registry, config()).unwrap();
    let entries = trail.entries();
    assert!(entries.contains(&"generated:10".to_string()));
    assert!(entries.contains(&"generated:20".to_string()));
    assert_eq!(entries.iter().filter(|e| e.starts_with("generated")).count(), 2);
}

#[test]
fn events_nest_properly() {
    let mut registry = TestRegistry::new();
    test_case!(registry, "nesting", |ctx| {
        section!(ctx, "outer", |ctx| {
            section!(ctx, "inner", |ctx| {
                check!(ctx, true);
                Ok(())
            })
        })
    })
    .unwrap();

    let (_summary, log) = run(registry, config()).unwrap();
    let mut depth = 0i32;
    let mut max_depth = 0i32;
    for event in log.events() {
        match event {
            Event::RunStarting { .. }
            | Event::GroupStarting { .. }
            | Event::TestCaseStarting { .. }
            | Event::SectionStarting { .. } => depth += 1,
            Event::SectionEnded { .. }
            | Event::TestCaseEnded { .. }
            | Event::GroupEnded { .. }
            | Event::RunEnded { .. } => depth -= 1,
            _ => {}
        }
        assert!(depth >= 0);
        max_depth = max_depth.max(depth);
    }
    assert_eq!(depth, 0);
    assert_eq!(max_depth, 6);
    assert!(matches!(log.events().first(), Some(Event::RunStarting { .. })));
    assert!(matches!(log.events().last(), Some(Event::RunEnded { .. })));
}

#[test]
fn require_ends_the_pass_but_not_the_test() {
    let mut registry = TestRegistry::new();
    let trail = Trail::default();
    let seen = trail.clone();
    test_case!(registry, "requirements", move |ctx| {
        section!(ctx, "broken", |ctx| {
            require_eq!(ctx, 2 + 2, 5)?;
            seen.push("after require");
            Ok(())
        })?;
        section!(ctx, "fine", |ctx| {
            seen.push("fine");
            succeed!(ctx, "reached");
            Ok(())
        })
    })
    .unwrap();

    let (summary, log) = run(registry, config()).unwrap();
    assert_eq!(trail.entries(), vec!["fine"]);
    assert_eq!(summary.totals.assertions, Counts::new(1, 1, 0));
    let failure = log
        .events()
        .into_iter()
        .find_map(|event| match event {
            Event::AssertionEnded {
                kind: ResultKind::ExpressionFailed,
                expression,
                message,
                ..
            } => Some((expression, message)),
            _ => None,
        })
        .unwrap();
    assert_eq!(failure, ("2 + 2 == 5".to_string(), "4 == 5".to_string()));
}

#[test]
fn explicit_failures_and_warnings() {
    let mut registry = TestRegistry::new();
    test_case!(registry, "explicit", |ctx| {
        ctx.warn(here!(), "heads up");
        fail_check!(ctx, "soft {}", 1);
        fail!(ctx, "hard {}", 2)?;
        check!(ctx, true);
        Ok(())
    })
    .unwrap();

    let (summary, log) = run(registry, config()).unwrap();
    assert_eq!(summary.totals.assertions, Counts::new(0, 2, 0));
    let kinds: Vec<ResultKind> = log.outcomes().into_iter().map(|(kind, _)| kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResultKind::Warning,
            ResultKind::ExplicitFailure,
            ResultKind::ExplicitFailure
        ]
    );
}

#[test]
fn empty_generator_is_reported_as_an_exception() {
    let mut registry = TestRegistry::new();
    test_case!(registry, "nothing to generate", |ctx| {
        let empty: [u8; 0] = [];
        let _value = ctx.generate(here!(), &empty)?;
        Ok(())
    })
    .unwrap();

    let (summary, log) = run(registry, config()).unwrap();
    assert_eq!(summary.totals.assertions.failed, 1);
    assert_eq!(log.outcomes()[0].0, ResultKind::ThrewException);
}

#[test]
fn tree_shape_is_reproducible() {
    fn build() -> TestRegistry {
        let mut registry = TestRegistry::new();
        test_case!(registry, "shape", |ctx| {
            section!(ctx, "a", |ctx| {
                section!(ctx, "a1", |ctx| {
                    check!(ctx, true);
                    Ok(())
                })?;
                section!(ctx, "a2", |ctx| {
                    check!(ctx, true);
                    Ok(())
                })
            })?;
            section!(ctx, "b", |ctx| {
                check!(ctx, true);
                Ok(())
            })
        })
        .unwrap();
        registry
    }

    let (_first, first_log) = run(build(), config()).unwrap();
    let (_second, second_log) = run(build(), config()).unwrap();
    assert_eq!(first_log.sections_entered(), second_log.sections_entered());
    assert_eq!(first_log.to_json().unwrap(), second_log.to_json().unwrap());
}
