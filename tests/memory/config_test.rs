/*!
 * Configuration Tests
 * JSON loading, environment overrides and bootstrap from configuration
 */

use pretty_assertions::assert_eq;
use serial_test::serial;
use std::io::Write;
use tiered_heap::core::config::{ENV_EMERGENCY_POLICY, ENV_EMERGENCY_RESERVE, ENV_LARGE_THRESHOLD};
use tiered_heap::core::limits::{DEFAULT_ALIGN_BLOCKS, OSPI_BASE, OSPI_SIZE};
use tiered_heap::memory::TieredHeap;
use tiered_heap::{EmergencyPolicy, HeapConfig, HeapError, RegionConfig};

const LAYOUT: &str = r#"{
    "policy": {
        "large_object_threshold": 2048,
        "emergency_policy": "permissive"
    },
    "internal": { "base": 536870912, "size": 8192, "block_size": 16 },
    "regions": [
        { "name": "ospi", "base": 1744830464, "size": 131072, "block_size": 32 }
    ]
}"#;

fn clear_env() {
    std::env::remove_var(ENV_LARGE_THRESHOLD);
    std::env::remove_var(ENV_EMERGENCY_RESERVE);
    std::env::remove_var(ENV_EMERGENCY_POLICY);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(LAYOUT.as_bytes()).unwrap();

    let config = HeapConfig::from_file(file.path()).unwrap();
    assert_eq!(config.policy.large_object_threshold, 2048);
    assert_eq!(config.policy.emergency_reserve, 8 * 1024);
    assert_eq!(config.policy.emergency_policy, EmergencyPolicy::Permissive);
    assert_eq!(config.regions[0].base, OSPI_BASE);
    assert_eq!(config.regions[0].align_blocks, DEFAULT_ALIGN_BLOCKS);

    let heap = TieredHeap::from_config(&config).unwrap();
    assert_eq!(heap.total_capacity(), 8192 + 131072);
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = HeapConfig::from_file(dir.path().join("absent.json"));
    assert!(matches!(result, Err(HeapError::Config(_))));
}

#[test]
fn test_invalid_region_rejected() {
    let json = r#"{ "regions": [ { "name": "bad", "base": 0, "size": 4096, "block_size": 24 } ] }"#;
    assert!(HeapConfig::from_json_str(json).is_err());
}

#[test]
fn test_huge_region_is_rejected_without_allocating() {
    let huge = RegionConfig::new("sdram", 0x7000_0000, usize::MAX / 4, 32);
    let config = HeapConfig::testing().with_region(huge.clone());
    assert!(matches!(
        TieredHeap::from_config(&config),
        Err(HeapError::InvalidRegion(_))
    ));

    let mut heap = TieredHeap::from_config(&HeapConfig::testing()).unwrap();
    assert!(matches!(
        heap.register_region(&huge),
        Err(HeapError::InvalidRegion(_))
    ));
    assert_eq!(heap.regions().len(), 1);
}

#[test]
fn test_extra_region_from_config() {
    let config = HeapConfig::testing()
        .with_region(RegionConfig::new("sdram", 0x7000_0000, 16 * 1024, 32));
    let heap = TieredHeap::from_config(&config).unwrap();
    assert_eq!(heap.regions().len(), 2);
    assert_eq!(heap.regions()[1].name(), "sdram");
    assert_eq!(heap.total_capacity(), 4 * 1024 + 64 * 1024 + 16 * 1024);
}

#[test]
fn test_embedded_layout_bootstraps() {
    let heap = TieredHeap::from_config(&HeapConfig::embedded()).unwrap();
    assert_eq!(heap.regions()[0].base(), OSPI_BASE);
    assert_eq!(heap.regions()[0].capacity(), OSPI_SIZE);
    assert_eq!(heap.regions()[0].block_count(), OSPI_SIZE / 32);
    assert!(!heap.is_emergency());
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    std::env::set_var(ENV_LARGE_THRESHOLD, "4096");
    std::env::set_var(ENV_EMERGENCY_RESERVE, " 1024 ");
    std::env::set_var(ENV_EMERGENCY_POLICY, "Permissive");

    let config = HeapConfig::testing().with_env_overrides().unwrap();
    clear_env();

    assert_eq!(config.policy.large_object_threshold, 4096);
    assert_eq!(config.policy.emergency_reserve, 1024);
    assert_eq!(config.policy.emergency_policy, EmergencyPolicy::Permissive);
}

#[test]
#[serial]
fn test_bad_env_override_is_reported() {
    clear_env();
    std::env::set_var(ENV_EMERGENCY_RESERVE, "lots");
    let result = HeapConfig::testing().with_env_overrides();
    clear_env();
    assert!(matches!(result, Err(HeapError::Config(_))));
}
