use super::*;
use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn connect_fails_when_no_socket_present() {
    let dir = tempdir().unwrap();
    unsafe {
        std::env::set_var("SUBSTRAT_STATE_DIR", dir.path());
    }
    let err = DaemonClient::connect().unwrap_err();
    assert!(matches!(err, ClientError::DaemonNotRunning(_)));
    unsafe {
        std::env::remove_var("SUBSTRAT_STATE_DIR");
    }
}

#[test]
#[serial]
fn connect_succeeds_once_socket_file_exists() {
    let dir = tempdir().unwrap();
    unsafe {
        std::env::set_var("SUBSTRAT_STATE_DIR", dir.path());
    }
    std::fs::write(dir.path().join("daemon.sock"), b"").unwrap();
    let client = DaemonClient::connect().unwrap();
    assert_eq!(client.socket_path, dir.path().join("daemon.sock"));
    unsafe {
        std::env::remove_var("SUBSTRAT_STATE_DIR");
    }
}
