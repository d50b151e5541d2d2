//! Save/load round trips and concurrent play through the tavern.
//!
//! Run with: `cargo test -p nobles-core --test persistence`

use std::sync::Arc;

use nobles_core::persist::{list_saves, save_path, SavedParty};
use nobles_core::{
    GameSession, Intent, PartyConfig, RuleError, SessionError, StatusChoice, Tavern,
};
use tempfile::TempDir;

fn sign_in(name: &str, status: StatusChoice) -> Intent {
    Intent::SignIn {
        name: name.to_string(),
        status,
    }
}

fn pledge(player: &str, noble: &str) -> Intent {
    Intent::PledgeAllegiance {
        player: player.to_string(),
        noble: noble.to_string(),
    }
}

#[tokio::test]
async fn test_session_survives_save_and_load() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let config = PartyConfig::default().with_drink("mead", 12);
    let mut session = GameSession::new("Friday Night", config);
    session.act(sign_in("ada", StatusChoice::Noble)).unwrap();
    session.act(sign_in("bo", StatusChoice::Peasant)).unwrap();
    session.act(pledge("bo", "ada")).unwrap();
    session
        .act(Intent::Ban {
            noble: "ada".into(),
            peasant: "cy".into(),
        })
        .unwrap_err();
    session
        .act(Intent::BuyDrink {
            player: "bo".into(),
            drink: "mead".into(),
            quantity: 2,
        })
        .unwrap();

    let path = save_path(temp_dir.path(), session.party());
    session.save(&path).await.expect("Save should succeed");

    let mut loaded = GameSession::load(&path).await.expect("Load should succeed");
    assert_eq!(loaded.party().players, session.party().players);
    assert_eq!(loaded.party().config.drink_price("mead"), Some(12));
    assert_eq!(loaded.party().find("ada").map(|p| p.coin), Some(76));

    // The loaded party keeps playing by the same rules
    let response = loaded.act(pledge("ada", "bo")).unwrap_err();
    assert_eq!(response.to_string(), "Unsuccessful! bo is not a noble.");

    let saves = list_saves(temp_dir.path()).await.unwrap();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].metadata.party_name, "friday night");
    assert_eq!(saves[0].metadata.ruler.as_deref(), Some("ada"));
}

#[tokio::test]
async fn test_loaded_party_joins_tavern_once() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("party.json");

    let tavern = Tavern::new();
    let id = tavern.open_party("regulars", PartyConfig::default()).await.unwrap();
    tavern.act(id, sign_in("ada", StatusChoice::Noble)).await.unwrap();

    let party = tavern.snapshot(id).await.unwrap();
    SavedParty::new(party).save_json(&path).await.unwrap();

    let loaded = GameSession::load(&path).await.unwrap();
    assert!(matches!(
        tavern.insert(loaded).await,
        Err(SessionError::PartyNameTaken(_))
    ));

    tavern.close_party(id).await.unwrap();
    let loaded = GameSession::load(&path).await.unwrap();
    let reopened = tavern.insert(loaded).await.unwrap();
    assert_eq!(reopened, id);
    assert_eq!(tavern.snapshot(id).await.unwrap().player_names(), vec!["ada"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pledges_keep_counts_consistent() {
    let tavern = Arc::new(Tavern::new());
    let id = tavern.open_party("crowded", PartyConfig::default()).await.unwrap();

    for noble in ["north", "south"] {
        tavern.act(id, sign_in(noble, StatusChoice::Noble)).await.unwrap();
    }
    let peasants: Vec<String> = (0..16).map(|i| format!("peasant{i}")).collect();
    for peasant in &peasants {
        tavern.act(id, sign_in(peasant, StatusChoice::Peasant)).await.unwrap();
    }

    let mut handles = Vec::new();
    for round in 0..4 {
        for (i, peasant) in peasants.iter().enumerate() {
            let tavern = Arc::clone(&tavern);
            let noble = if (i + round) % 2 == 0 { "north" } else { "south" };
            let intent = pledge(peasant, noble);
            handles.push(tokio::spawn(async move { tavern.act(id, intent).await }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let party = tavern.snapshot(id).await.unwrap();
    party.check_invariants().unwrap();
    let soldiers: u32 = party.nobles().map(|p| p.soldiers).sum();
    assert_eq!(soldiers, 2 + 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_usurpation_racing_a_ban_stays_consistent() {
    let tavern = Arc::new(Tavern::new());

    for round in 0..32 {
        let id = tavern
            .open_party(&format!("race {round}"), PartyConfig::default())
            .await
            .unwrap();
        tavern.act(id, sign_in("noble", StatusChoice::Noble)).await.unwrap();
        for peasant in ["usurper", "subject"] {
            tavern.act(id, sign_in(peasant, StatusChoice::Peasant)).await.unwrap();
        }
        tavern.act(id, pledge("subject", "noble")).await.unwrap();

        let duel = {
            let tavern = Arc::clone(&tavern);
            tokio::spawn(async move {
                let intent = Intent::Duel {
                    challenger: "usurper".into(),
                    target: "noble".into(),
                    winner: "usurper".into(),
                };
                tavern.act(id, intent).await
            })
        };
        let ban = {
            let tavern = Arc::clone(&tavern);
            tokio::spawn(async move {
                let intent = Intent::Ban {
                    noble: "noble".into(),
                    peasant: "subject".into(),
                };
                tavern.act(id, intent).await
            })
        };

        duel.await.unwrap().expect("the duel is valid in either order");
        match ban.await.unwrap() {
            // The ban landed first and was purged by the demotion
            Ok(_) => {}
            // The duel landed first and the banner was no longer a noble
            Err(SessionError::Rule(RuleError::InvalidRole { player, .. })) => {
                assert_eq!(player, "noble");
            }
            Err(err) => panic!("unexpected ban failure: {err}"),
        }

        let party = tavern.snapshot(id).await.unwrap();
        party.check_invariants().unwrap();
        assert!(party.outlaws.is_empty());
        assert!(party.find("usurper").unwrap().is_noble());
        assert!(party.find("noble").unwrap().is_peasant());
    }
}

#[tokio::test]
async fn test_parties_are_independent() {
    let tavern = Tavern::new();
    let first = tavern.open_party("first", PartyConfig::default()).await.unwrap();
    let second = tavern.open_party("second", PartyConfig::default()).await.unwrap();

    tavern.act(first, sign_in("ada", StatusChoice::Noble)).await.unwrap();
    tavern.act(second, sign_in("ada", StatusChoice::Peasant)).await.unwrap();

    let first = tavern.snapshot(first).await.unwrap();
    let second = tavern.snapshot(second).await.unwrap();
    assert!(first.find("ada").unwrap().is_noble());
    assert!(second.find("ada").unwrap().is_peasant());
    assert_eq!(
        tavern.party_names().await,
        vec!["first".to_string(), "second".to_string()]
    );
}
