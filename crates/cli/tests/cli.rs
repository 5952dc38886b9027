//! End-to-end tests driving the `canopy` binary

mod common;

use anyhow::Result;
use common::TestTree;

#[test]
fn init_is_idempotent() -> Result<()> {
    let tree = TestTree::init()?;
    let again = tree.json(&["init"])?;
    assert_eq!(again["created"], false);
    assert_eq!(again["root"]["id"], "root");
    assert!(tree.data_dir().join("config.toml").exists());
    Ok(())
}

#[test]
fn commands_require_init() -> Result<()> {
    let tree = TestTree::uninitialized()?;
    let result = tree.run(&["show", "root"]).assert_failure()?;
    assert!(result.contains_stderr("canopy init"));
    Ok(())
}

#[test]
fn create_propose_accept_flow() -> Result<()> {
    let tree = TestTree::init()?;
    tree.run(&["create", "lang", "Languages"]).assert_success()?;

    let created = tree.json(&["create", "rust", "Rust", "--parent", "lang"])?;
    assert_eq!(created["branch"]["parent"], "root");
    assert_eq!(created["proposal"]["status"], "pending");

    let pending = tree.json(&["requests", "lang"])?;
    assert_eq!(pending.as_array().map(Vec::len), Some(1));

    let decided = tree.json(&["decide", "lang", "rust", "accept"])?;
    assert_eq!(decided["status"], "accepted");
    assert_eq!(decided["relocation"]["new_parent"], "lang");

    assert_eq!(tree.ids(&["ancestors", "rust"])?, vec!["lang", "root", "rust"]);
    assert_eq!(tree.ids(&["children", "lang"])?, vec!["rust"]);
    assert_eq!(tree.ids(&["descendants", "lang"])?, vec!["lang", "rust"]);
    Ok(())
}

#[test]
fn cycle_and_duplicate_report_conflict() -> Result<()> {
    let tree = TestTree::init()?;
    tree.run(&["create", "a", "A"]).assert_success()?;
    tree.run(&["create", "b", "B", "--parent", "a"]).assert_success()?;
    tree.run(&["decide", "a", "b", "accept"]).assert_success()?;

    // Conflict exits with status 3
    let cycle = tree.run(&["propose", "b", "a"]).assert_failure()?;
    assert_eq!(cycle.exit_code, 3);
    assert!(cycle.contains_stderr("cycle"));

    tree.run(&["create", "c", "C"]).assert_success()?;
    tree.run(&["propose", "a", "c"]).assert_success()?;
    let duplicate = tree.run(&["propose", "a", "c"]).assert_failure()?;
    assert_eq!(duplicate.exit_code, 3);

    let missing = tree.run(&["decide", "b", "c", "reject"]).assert_failure()?;
    assert_eq!(missing.exit_code, 2);
    Ok(())
}

#[test]
fn delete_reassigns_and_verify_stays_clean() -> Result<()> {
    let tree = TestTree::init()?;
    tree.run(&["create", "p", "P"]).assert_success()?;
    for child in ["x", "y"] {
        tree.run(&["create", child, child, "--parent", "p"]).assert_success()?;
        tree.run(&["decide", "p", child, "accept"]).assert_success()?;
    }
    tree.run(&["create", "z", "Z", "--parent", "x"]).assert_success()?;
    tree.run(&["decide", "x", "z", "accept"]).assert_success()?;

    // Only root-level branches can be deleted
    let interior = tree.run(&["delete", "x"]).assert_failure()?;
    assert_eq!(interior.exit_code, 4);

    let report = tree.json(&["delete", "p"])?;
    assert_eq!(report["reassigned"], serde_json::json!(["x", "y"]));
    assert_eq!(tree.ids(&["ancestors", "z"])?, vec!["root", "x", "z"]);

    let verify = tree.json(&["verify"])?;
    assert_eq!(verify["violations"], serde_json::json!([]));
    assert_eq!(verify["branches_checked"], 4);
    Ok(())
}

#[test]
fn moderators_receive_notifications_and_log_is_written() -> Result<()> {
    let tree = TestTree::init()?;
    tree.run(&["create", "lang", "Languages"]).assert_success()?;
    tree.run(&["create", "rust", "Rust"]).assert_success()?;
    tree.run(&["mod", "add", "lang", "alice"]).assert_success()?;

    tree.run_as("carol", &["propose", "lang", "rust"]).assert_success()?;
    let inbox = tree.json(&["notifications", "alice"])?;
    assert_eq!(inbox[0]["kind"], "relocation-proposed");

    tree.run_as("alice", &["decide", "lang", "rust", "reject"]).assert_success()?;
    let carol = tree.json(&["notifications", "carol", "--clear"])?;
    assert_eq!(carol.as_array().map(Vec::len), Some(1));
    assert_eq!(tree.json(&["notifications", "carol"])?, serde_json::json!([]));

    let log = tree.json(&["log", "--branch", "lang", "--limit", "5"])?;
    assert_eq!(log[0]["action"], "reject-relocation");
    assert_eq!(log[0]["actor"], "alice");

    assert_eq!(tree.json(&["mod", "list", "lang"])?, serde_json::json!(["alice"]));
    Ok(())
}

#[test]
fn detach_moves_to_root() -> Result<()> {
    let tree = TestTree::init()?;
    tree.run(&["create", "a", "A"]).assert_success()?;
    tree.run(&["create", "b", "B", "--parent", "a"]).assert_success()?;
    tree.run(&["decide", "a", "b", "accept"]).assert_success()?;

    let report = tree.json(&["detach", "b"])?;
    assert_eq!(report["old_parent"], "a");
    assert_eq!(tree.ids(&["ancestors", "b"])?, vec!["b", "root"]);

    let root = tree.run(&["detach", "root"]).assert_failure()?;
    assert_eq!(root.exit_code, 4);
    Ok(())
}

#[test]
fn config_round_trip() -> Result<()> {
    let tree = TestTree::init()?;
    tree.run(&["config", "set", "max_id_len", "12"]).assert_success()?;
    let value = tree.run(&["config", "get", "max_id_len"]).assert_success()?;
    assert_eq!(value.stdout.trim(), "12");

    // Rejected by validation and not persisted
    tree.run(&["config", "set", "max_id_len", "500"]).assert_failure()?;
    let config = tree.json(&["config", "list"])?;
    assert_eq!(config["max_id_len"], 12);

    let too_long = tree.run(&["create", "much-too-long-id", "X"]).assert_failure()?;
    assert_eq!(too_long.exit_code, 6);
    Ok(())
}
