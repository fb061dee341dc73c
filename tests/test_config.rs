use std::time::Duration;

use ferrite::config::Config;

#[test]
fn test_config_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.server.max_connections, 1024);
    assert_eq!(cfg.server.idle_timeout_ms, 30_000);
    assert_eq!(cfg.server.buffer_capacity_bytes, 16 * 1024);
    assert_eq!(cfg.server.accept_backlog, 128);
    assert_eq!(cfg.server.shutdown_grace_ms, 5_000);
}

#[test]
fn test_config_load_without_env_uses_defaults() {
    unsafe {
        std::env::remove_var("FERRITE_CONFIG");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
}

#[test]
fn test_config_from_full_yaml() {
    let cfg = Config::from_yaml(
        "server:\n  listen_addr: 0.0.0.0:9000\n  max_connections: 64\n  idle_timeout_ms: 1500\n  buffer_capacity_bytes: 4096\n  accept_backlog: 32\n  shutdown_grace_ms: 250\n",
    )
    .unwrap();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:9000");
    assert_eq!(cfg.server.max_connections, 64);
    assert_eq!(cfg.server.idle_timeout_ms, 1500);
    assert_eq!(cfg.server.buffer_capacity_bytes, 4096);
    assert_eq!(cfg.server.accept_backlog, 32);
    assert_eq!(cfg.server.shutdown_grace_ms, 250);
}

#[test]
fn test_config_partial_yaml_keeps_defaults() {
    let cfg = Config::from_yaml("server:\n  max_connections: 2\n").unwrap();
    assert_eq!(cfg.server.max_connections, 2);
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.server.buffer_capacity_bytes, 16 * 1024);
}

#[test]
fn test_config_invalid_yaml_is_an_error() {
    assert!(Config::from_yaml("server: [not, a, mapping").is_err());
}

#[test]
fn test_duration_helpers() {
    let cfg = Config::from_yaml("server:\n  idle_timeout_ms: 750\n  shutdown_grace_ms: 100\n")
        .unwrap();
    assert_eq!(cfg.server.idle_timeout(), Duration::from_millis(750));
    assert_eq!(cfg.server.shutdown_grace(), Duration::from_millis(100));
}
