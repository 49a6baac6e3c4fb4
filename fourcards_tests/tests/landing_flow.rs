//! Landing flow against the mock process: wallet bootstrap, registration,
//! room creation and session persistence.

use fourcards_client::client::LandingState;
use fourcards_shared::{
    error::GameError,
    net::Action,
    reply::RegisterOutcome,
    session::SessionStore,
};
use fourcards_tests::{client_for, client_with, init_tracing, test_config, MockProcess};

#[tokio::test]
async fn fresh_session_generates_wallet_and_asks_for_username() -> anyhow::Result<()> {
    init_tracing();
    let mock = MockProcess::new();
    let mut client = client_for(&mock);

    let first = client.init_landing().await?;
    let LandingState::NeedsUsername {
        address,
        new_wallet,
    } = first.clone()
    else {
        panic!("expected NeedsUsername, got {first:?}");
    };
    assert!(new_wallet);
    assert_eq!(client.session().address(), Some(address.as_str()));

    // The stored wallet is reused on the next visit.
    let second = client.init_landing().await?;
    assert_eq!(
        second,
        LandingState::NeedsUsername {
            address,
            new_wallet: false
        }
    );
    Ok(())
}

#[tokio::test]
async fn known_wallet_lands_ready_with_remote_username() -> anyhow::Result<()> {
    let mock = MockProcess::new();
    let mut client = client_for(&mock);
    let LandingState::NeedsUsername { address, .. } = client.init_landing().await? else {
        panic!("fresh wallet should not be registered");
    };

    mock.register(&address, "alice");
    let state = client.init_landing().await?;
    assert_eq!(
        state,
        LandingState::Ready {
            address,
            username: "alice".to_string()
        }
    );
    assert_eq!(client.session().username(), Some("alice"));
    Ok(())
}

#[tokio::test]
async fn register_then_rename() -> anyhow::Result<()> {
    let mock = MockProcess::new();
    let mut client = client_for(&mock);
    client.init_landing().await?;

    let reg = client.register_player("  alice  ").await?;
    assert_eq!(reg.outcome, RegisterOutcome::Registered);
    assert_eq!(reg.username, "alice");
    assert_eq!(reg.resume, None);
    assert_eq!(client.session().username(), Some("alice"));

    let reg = client.register_player("alicia").await?;
    assert_eq!(reg.outcome, RegisterOutcome::Updated);
    assert_eq!(client.session().username(), Some("alicia"));
    assert_eq!(mock.message_count(Action::RegisterPlayer), 2);
    Ok(())
}

#[tokio::test]
async fn taken_username_is_rejected_and_not_stored() -> anyhow::Result<()> {
    let mock = MockProcess::new();
    mock.register("someone-else", "alice");

    let mut client = client_for(&mock);
    client.init_landing().await?;
    let err = client.register_player("alice").await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<GameError>(),
        Some(&GameError::Rejected("Username already taken".to_string()))
    );
    assert_eq!(client.session().username(), None);
    Ok(())
}

#[tokio::test]
async fn blank_username_never_reaches_the_process() -> anyhow::Result<()> {
    let mock = MockProcess::new();
    let mut client = client_for(&mock);
    client.init_landing().await?;

    let err = client.register_player("   ").await.unwrap_err();
    assert_eq!(err.downcast_ref::<GameError>(), Some(&GameError::EmptyUsername));
    assert_eq!(mock.message_count(Action::RegisterPlayer), 0);
    Ok(())
}

#[tokio::test]
async fn register_without_wallet_fails() {
    let mock = MockProcess::new();
    let mut client = client_for(&mock);
    let err = client.register_player("alice").await.unwrap_err();
    assert_eq!(err.downcast_ref::<GameError>(), Some(&GameError::MissingWallet));
}

#[tokio::test]
async fn create_room_returns_shareable_invite() -> anyhow::Result<()> {
    let mock = MockProcess::new();
    let mut client = client_for(&mock);
    client.init_landing().await?;
    client.register_player("alice").await?;

    let created = client.create_room().await?;
    assert_eq!(created.room.message, "Game room created");
    assert_eq!(created.invite.game_id, created.room.game_id);
    assert_eq!(created.invite.code, created.room.password);
    assert_eq!(
        created.invite.link(&client.config().app_origin),
        format!(
            "http://localhost:3000/room/{}?c={}",
            created.room.game_id, created.room.password
        )
    );

    let address = client.session().address().map(str::to_string);
    assert_eq!(mock.players(&created.room.game_id), vec![address.unwrap_or_default()]);
    Ok(())
}

#[tokio::test]
async fn console_create_requires_username() -> anyhow::Result<()> {
    let mock = MockProcess::new();
    let mut client = client_for(&mock);
    client.init_landing().await?;

    let err = client.exec_console("create").await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<GameError>(),
        Some(&GameError::UsernameRequired)
    );
    assert_eq!(mock.message_count(Action::CreateGameRoom), 0);
    Ok(())
}

#[tokio::test]
async fn session_survives_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("session.json");
    let mock = MockProcess::new();

    let address = {
        let mut client = client_with(&mock, test_config(), SessionStore::open(&path)?);
        client.init_landing().await?;
        client.register_player("alice").await?;
        client.session().address().map(str::to_string)
    };

    let mut client = client_with(&mock, test_config(), SessionStore::open(&path)?);
    assert_eq!(client.session().address().map(str::to_string), address);
    assert_eq!(client.session().username(), Some("alice"));
    assert!(matches!(
        client.init_landing().await?,
        LandingState::Ready { .. }
    ));

    client.logout().await?;
    assert!(!path.exists());
    assert_eq!(client.session().address(), None);
    Ok(())
}

#[tokio::test]
async fn blank_remote_username_is_not_registered() -> anyhow::Result<()> {
    let mock = MockProcess::new();
    let mut client = client_for(&mock);
    let LandingState::NeedsUsername { address, .. } = client.init_landing().await? else {
        panic!("fresh wallet should not be registered");
    };

    mock.register(&address, "");
    assert_eq!(
        client.init_landing().await?,
        LandingState::NeedsUsername {
            address,
            new_wallet: false
        }
    );
    assert_eq!(client.session().username(), None);
    Ok(())
}

#[tokio::test]
async fn stored_name_is_dropped_when_process_has_no_registration() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("session.json");

    let first = MockProcess::new();
    {
        let mut client = client_with(&first, test_config(), SessionStore::open(&path)?);
        client.init_landing().await?;
        client.register_player("alice").await?;
    }

    // Same session against a process that never saw this wallet.
    let other = MockProcess::new();
    let mut client = client_with(&other, test_config(), SessionStore::open(&path)?);
    assert_eq!(client.session().username(), Some("alice"));
    assert!(matches!(
        client.init_landing().await?,
        LandingState::NeedsUsername {
            new_wallet: false,
            ..
        }
    ));
    assert_eq!(client.session().username(), None);
    assert_eq!(SessionStore::open(&path)?.username(), None);
    Ok(())
}

#[tokio::test]
async fn failed_lookup_falls_back_to_stored_name() -> anyhow::Result<()> {
    let mock = MockProcess::new();
    let mut client = client_for(&mock);
    let LandingState::NeedsUsername { address, .. } = client.init_landing().await? else {
        panic!("fresh wallet should not be registered");
    };
    client.register_player("alice").await?;

    mock.fail_user_info(&address);
    assert_eq!(
        client.init_landing().await?,
        LandingState::Ready {
            address,
            username: "alice".to_string()
        }
    );
    Ok(())
}
