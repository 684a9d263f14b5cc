mod support;

use predicates::str::contains;

use support::TestForge;

#[test]
fn grant_update_revoke_round() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::with_project()?;

    forge
        .as_actor("pingou")
        .args(["access", "grant", "test", "foo", "ticket"])
        .assert()
        .success()
        .stdout(contains("User added"));

    forge
        .as_actor("pingou")
        .args(["access", "grant", "test", "foo", "commit"])
        .assert()
        .success()
        .stdout(contains("User access updated"));

    let envelope = forge.json("pingou", &["access", "show", "test", "--user", "foo"])?;
    assert_eq!(envelope["data"]["level"], "commit");

    forge
        .as_actor("pingou")
        .args(["access", "revoke", "test", "foo"])
        .assert()
        .success()
        .stdout(contains("User removed"));

    let envelope = forge.json("pingou", &["access", "show", "test", "--user", "foo"])?;
    assert!(envelope["data"]["level"].is_null());

    Ok(())
}

#[test]
fn regranting_same_level_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::with_project()?;
    forge
        .as_actor("pingou")
        .args(["access", "grant", "test", "foo", "ticket"])
        .assert()
        .success();

    let envelope = forge.json("pingou", &["access", "grant", "test", "foo", "ticket"])?;
    assert_eq!(envelope["status"], "success");
    assert_eq!(envelope["data"]["changed"], false);
    assert_eq!(
        envelope["data"]["messages"][0],
        "This user is already associated to this project with that access"
    );

    Ok(())
}

#[test]
fn non_admin_cannot_grant() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::with_project()?;
    forge
        .as_actor("pingou")
        .args(["access", "grant", "test", "foo", "commit"])
        .assert()
        .success();

    forge
        .as_actor("foo")
        .args(["access", "grant", "test", "bar@pingou.com", "admin"])
        .assert()
        .code(3)
        .stderr(contains("not allowed"));

    Ok(())
}

#[test]
fn unknown_level_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::with_project()?;

    forge
        .as_actor("pingou")
        .args(["access", "grant", "test", "foo", "owner"])
        .assert()
        .code(2)
        .stderr(contains("Access level not found"));

    Ok(())
}

#[test]
fn group_members_inherit_access() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::with_project()?;
    forge
        .as_actor("pingou")
        .args(["group", "add", "devs", "--display-name", "Developers"])
        .assert()
        .success();
    forge
        .as_actor("pingou")
        .args(["group", "add-user", "devs", "foo"])
        .assert()
        .success()
        .stdout(contains("User `foo` added to the group `devs`."));
    forge
        .as_actor("pingou")
        .args(["access", "grant", "test", "devs", "commit", "--group"])
        .assert()
        .success()
        .stdout(contains("Group added"));

    let envelope = forge.json("pingou", &["access", "show", "test", "--user", "foo"])?;
    assert_eq!(envelope["data"]["level"], "commit");

    let envelope = forge.json("pingou", &["access", "members", "test", "--level", "commit"])?;
    let members = envelope["data"]["members"].as_array().cloned().unwrap_or_default();
    let names: Vec<&str> = members.iter().filter_map(|m| m["name"].as_str()).collect();
    assert!(names.contains(&"pingou"));
    assert!(names.contains(&"foo"));
    assert!(names.contains(&"devs"));

    let envelope = forge.json(
        "pingou",
        &["access", "members", "test", "--level", "commit", "--exact"],
    )?;
    let members = envelope["data"]["members"].as_array().cloned().unwrap_or_default();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["kind"], "group");

    Ok(())
}

#[test]
fn grants_queue_acl_refresh_jobs() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::with_project()?;

    let envelope = forge.json("pingou", &["access", "grant", "test", "foo", "ticket"])?;
    let job_id = envelope["data"]["jobs"][0]["job_id"]
        .as_str()
        .map(str::to_string)
        .ok_or("missing job id")?;
    assert_eq!(envelope["data"]["jobs"][0]["kind"], "refresh_acls");

    let jobs = forge.jobs()?;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["status"], "queued");

    let envelope = forge.json("pingou", &["job", "status", &job_id])?;
    assert_eq!(envelope["data"]["project"], "test");
    assert_eq!(envelope["data"]["kind"], "refresh_acls");

    Ok(())
}

#[test]
fn owner_cannot_be_revoked() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::with_project()?;

    forge
        .as_actor("pingou")
        .args(["access", "revoke", "test", "pingou"])
        .assert()
        .code(2)
        .stderr(contains("owner"));

    Ok(())
}

#[test]
fn levels_are_listed_highest_first() -> Result<(), Box<dyn std::error::Error>> {
    let forge = TestForge::init()?;

    let envelope = forge.json("pingou", &["access", "levels"])?;
    assert_eq!(envelope["data"], serde_json::json!(["admin", "commit", "ticket"]));

    Ok(())
}
