//! CommandChannel の統合テスト（`cat` などをデバッガの代わりに使う）

use lockdump_target::{Channel, ChannelError, CommandChannel, LaunchSpec};

#[test]
fn test_round_trip_through_cat() {
    let mut channel = CommandChannel::spawn(&LaunchSpec::new("cat"))
        .expect("Failed to spawn cat");

    channel.write(b"info threads\n").unwrap();
    let echoed = channel.read(13).unwrap();
    assert_eq!(echoed, b"info threads\n");

    // EOFで自分から終了するか、SIGKILLで止められる
    channel.close().unwrap();
}

#[test]
fn test_environment_is_minimal() {
    let spec = LaunchSpec::new("sh")
        .arg("-c")
        .arg("echo \"$TERM:$HOME\"")
        .env("TERM", "dumb");
    let mut channel = CommandChannel::spawn(&spec).unwrap();

    let out = channel.read(64).unwrap();
    assert_eq!(out, b"dumb:\n");

    let status = channel.close().unwrap();
    assert!(status.success());
}

#[test]
fn test_read_returns_empty_at_eof() {
    let spec = LaunchSpec::new("sh").arg("-c").arg("printf ab");
    let mut channel = CommandChannel::spawn(&spec).unwrap();

    assert_eq!(channel.read(10).unwrap(), b"ab");
    assert!(channel.read(10).unwrap().is_empty());
}

#[test]
fn test_close_kills_running_process() {
    let spec = LaunchSpec::new("sleep").arg("30");
    let channel = CommandChannel::spawn(&spec).unwrap();

    let status = channel.close().unwrap();
    assert!(!status.success());
}

#[test]
fn test_launch_failure() {
    let spec = LaunchSpec::new("/nonexistent/lockdump-test-debugger");
    match CommandChannel::spawn(&spec) {
        Err(ChannelError::Launch { program, .. }) => {
            assert!(program.contains("lockdump-test-debugger"));
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("spawn should fail"),
    }
}
