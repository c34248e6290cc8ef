//! Algebraic laws of diffing, duple canonicalization, correlation and
//! traversal order.

use el_compare::correlation::pearson;
use el_compare::{DupleId, center_out_order, diff};
use el_core::{Object, Path, Value};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-50i32..50).prop_map(|n| Value::Number(f64::from(n))),
        "[a-c]{0,2}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-d]", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Object>())),
        ]
    })
}

fn arb_path() -> impl Strategy<Value = Path> {
    prop::collection::vec("[a-c.]{1,3}", 1..4).prop_map(Path::from_segments)
}

proptest! {
    #[test]
    fn prop_diff_of_identical_values_is_empty(a in arb_value()) {
        prop_assert!(diff(&a, &a, &Path::root()).is_empty());
    }

    #[test]
    fn prop_changed_path_set_is_symmetric(a in arb_value(), b in arb_value()) {
        let forward = diff(&a, &b, &Path::root());
        let backward = diff(&b, &a, &Path::root());
        prop_assert_eq!(forward.path_set(), backward.path_set());
        prop_assert_eq!(forward.is_empty(), a == b);
    }

    #[test]
    fn prop_duple_id_ignores_discovery_order(p in arb_path(), q in arb_path()) {
        let forward = DupleId::new(p.clone(), q.clone());
        let backward = DupleId::new(q.clone(), p.clone());
        prop_assert_eq!(&forward, &backward);
        match forward {
            Some(id) => prop_assert!(id.a() < id.b()),
            None => prop_assert_eq!(p, q),
        }
    }

    #[test]
    fn prop_correlation_is_bounded(
        pairs in prop::collection::vec((-1.0e6f64..1.0e6, -1.0e6f64..1.0e6), 0..40)
    ) {
        let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        if let Some(r) = pearson(&xs, &ys) {
            prop_assert!((-1.0..=1.0).contains(&r));
        }
    }

    #[test]
    fn prop_constant_series_is_undefined(
        constant in -1.0e6f64..1.0e6,
        ys in prop::collection::vec(-1.0e6f64..1.0e6, 0..40)
    ) {
        let xs = vec![constant; ys.len()];
        prop_assert_eq!(pearson(&xs, &ys), None);
    }

    #[test]
    fn prop_center_out_visits_each_point_once(n in 0usize..64, limit in prop::option::of(0usize..40)) {
        let order = center_out_order(n, limit);
        let expected = match limit {
            Some(d) => n.min(1 + 2 * d),
            None => n,
        };
        prop_assert_eq!(order.len(), expected);

        let mut sorted = order.clone();
        sorted.sort_unstable();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), order.len());
        prop_assert!(order.iter().all(|&i| i < n));
        if n > 0 {
            prop_assert_eq!(order[0], n / 2);
        }
    }
}
