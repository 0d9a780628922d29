//! Black-box tests against `incdb::pager::Allocator`'s public surface.

use incdb::pager::Allocator;

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("incdb-alloc-it-{}.db", name))
}

/// Scenario S1 (spec §8): with N=10, allocate(3)→0, allocate(4)→3,
/// free(3,2), allocate(1)→3, allocate(1)→4; final bitmap 1111111000.
#[test]
fn scenario_s1_end_to_end() {
    let mut a = Allocator::new(temp_path("s1"), 8192, 10).unwrap();

    assert_eq!(a.allocate(3).unwrap(), 0);
    assert_eq!(a.allocate(4).unwrap(), 3);
    a.free(3, 2);
    assert_eq!(a.allocate(1).unwrap(), 3);
    assert_eq!(a.allocate(1).unwrap(), 4);

    assert_eq!(a.debug_bitmap(), "1111111000");
}

#[test]
fn exhaustion_surfaces_as_an_error() {
    let mut a = Allocator::new(temp_path("exhaustion"), 8192, 4).unwrap();
    a.allocate(4).unwrap();
    assert!(a.allocate(1).is_err());
}

#[test]
fn freed_pages_are_reusable() {
    let mut a = Allocator::new(temp_path("reuse"), 8192, 4).unwrap();
    let p = a.allocate(4).unwrap();
    a.free(p, 4);
    assert_eq!(a.allocate(4).unwrap(), p);
}
