//! # Parser Tests: Core-List Specifications
//!
//! Validates expansion of flat core-list strings into ordered core sequences.

use coremgr::dsa::{format_core_list, parse_core_list, CoreMask};
use std::time::Instant;

/// The three documented forms expand to the same explicit list.
#[test]
fn test_documented_forms() {
    assert_eq!(parse_core_list("0-3"), vec![0, 1, 2, 3]);
    assert_eq!(parse_core_list("0,1..3"), vec![0, 1, 2, 3]);
    assert_eq!(parse_core_list("0-3:2"), vec![0, 2]);
}

/// Within each range the output is ascending and respects the stride.
#[test]
fn test_ranges_respect_stride() {
    let t = Instant::now();

    for first in 0..16usize {
        for last in first..first + 24 {
            for stride in 1..6usize {
                let spec = format!("{first}-{last}:{stride}");
                let cores = parse_core_list(&spec);

                assert_eq!(cores.first(), Some(&first), "{spec}");
                assert!(cores.windows(2).all(|w| w[1] == w[0] + stride), "{spec}");
                assert!(*cores.last().unwrap() <= last, "{spec}");
                assert!(cores.last().unwrap() + stride > last, "{spec}");

                let dotted = format!("{first}..{last}:{stride}");
                assert_eq!(parse_core_list(&dotted), cores, "{dotted}");
            }
        }
    }

    let overhead = t.elapsed();
    println!("test_ranges_respect_stride: Testing Overhead = {:?}", overhead);
}

/// Tokens keep their left-to-right order even when that is not ascending.
#[test]
fn test_token_order_preserved() {
    assert_eq!(parse_core_list("8-9, 0, 4..5"), vec![8, 9, 0, 4, 5]);
}

/// Text that matches no token is skipped; trailing garbage emits nothing.
#[test]
fn test_filler_and_trailing_garbage() {
    assert_eq!(parse_core_list("cpus=[0 - 1] {3}"), vec![0, 1, 3]);
    assert_eq!(parse_core_list("2,3,abc"), vec![2, 3]);
    assert_eq!(parse_core_list("5-"), vec![5]);
}

/// The kernel cpulist rendering feeds back into the parser unchanged.
#[test]
fn test_format_is_parseable() {
    let cores = vec![0, 1, 2, 5, 7, 8, 9, 64, 65];
    let rendered = format_core_list(cores.clone());
    assert_eq!(rendered, "0-2,5,7-9,64-65");
    assert_eq!(parse_core_list(&rendered), cores);

    let mask: CoreMask = parse_core_list("0-3,8").into_iter().collect();
    assert_eq!(mask.to_string(), "0-3,8");
}
