use forgecore::access::{self, AccessLevel, Principal};
use forgecore::config::Config;
use forgecore::identity;
use forgecore::issues::{self, NewIssue};
use forgecore::model::{ForgeState, TagTarget};
use forgecore::notify::{Emitter, MemorySink};
use forgecore::project::{self, NewProject};
use forgecore::session::Session;
use forgecore::tags;

fn seeded() -> Result<Session, forgecore::Error> {
    let mut session = Session::in_memory(ForgeState::new());
    identity::create_user(&mut session, "pingou", "PY C", &["bar@pingou.com".to_string()])?;
    identity::create_user(&mut session, "foo", "foo bar", &["foo@bar.com".to_string()])?;
    let new = NewProject {
        name: "test",
        namespace: None,
        owner: "pingou",
        description: "test project",
        private: false,
    };
    project::create(&mut session, &new, &Config::default().issues.close_statuses)?;
    Ok(session)
}

#[test]
fn commit_delivers_queued_notifications() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = seeded()?;
    access::grant(&mut session, "test", &Principal::user("foo"), AccessLevel::Ticket, "pingou")?;
    let key = issues::new_issue(
        &mut session,
        "test",
        &NewIssue {
            title: "Test issue",
            content: "We should work on this",
            ..NewIssue::default()
        },
        "pingou",
    )?;
    assert_eq!(key.id, 1);

    let sink = MemorySink::new();
    let mut emitter = Emitter::new().with_sink(sink.clone());
    let report = session.commit(&mut emitter)?;
    assert!(report.warnings.is_empty());
    assert!(session.pending().is_empty());

    let delivered = sink.notifications();
    assert_eq!(delivered.len(), report.notifications);
    let issue_new = delivered
        .iter()
        .find(|n| n.topic.as_str() == "issue.new")
        .ok_or("missing issue.new")?;
    assert!(issue_new.audience.contains("foo"));
    assert!(!issue_new.audience.contains("pingou"));

    Ok(())
}

#[test]
fn failed_mutation_queues_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = seeded()?;
    let before = session.pending().len();

    let err = tags::add(
        &mut session,
        &TagTarget::project("test"),
        &["bad/tag".to_string()],
        "pingou",
        "DeepSkyBlue",
    )
    .expect_err("invalid tag");
    assert_eq!(err.exit_code(), 2);
    assert_eq!(session.pending().len(), before);
    assert!(session.state().tags.is_empty());

    Ok(())
}

#[test]
fn rollback_discards_pending_work() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = seeded()?;
    tags::add(
        &mut session,
        &TagTarget::project("test"),
        &["infra".to_string()],
        "pingou",
        "DeepSkyBlue",
    )?;
    let pending = session.pending().len();
    assert!(pending > 0);
    assert_eq!(session.rollback(), pending);

    Ok(())
}
