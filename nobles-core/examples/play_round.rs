//! Play one round of Nobles and Peasants in a single party.
//!
//! Run with: `cargo run -p nobles-core --example play_round`

use nobles_core::persist::save_path;
use nobles_core::{Difficulty, Intent, PartyConfig, StatusChoice, Tavern};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let tavern = Tavern::new();
    let config = PartyConfig::default().with_drink("mead", 30);
    let party = tavern.open_party("The Rusty Dragon", config).await?;

    let script = vec![
        Intent::SignIn {
            name: "Ada".into(),
            status: StatusChoice::Noble,
        },
        Intent::SignIn {
            name: "Bo".into(),
            status: StatusChoice::Random,
        },
        Intent::SignIn {
            name: "Cy".into(),
            status: StatusChoice::Peasant,
        },
        Intent::SignIn {
            name: "Di".into(),
            status: StatusChoice::Peasant,
        },
        Intent::PledgeAllegiance {
            player: "cy".into(),
            noble: "ada".into(),
        },
        Intent::PledgeAllegiance {
            player: "di".into(),
            noble: "bo".into(),
        },
        Intent::Ban {
            noble: "ada".into(),
            peasant: "di".into(),
        },
        Intent::PledgeAllegiance {
            player: "di".into(),
            noble: "ada".into(),
        },
        Intent::BuyDrink {
            player: "cy".into(),
            drink: "mead".into(),
            quantity: 2,
        },
        Intent::CompleteQuest {
            player: "di".into(),
            difficulty: Difficulty::Hard,
            completed: true,
        },
        Intent::Challenge {
            challenger: "di".into(),
            target: "ada".into(),
        },
        Intent::Duel {
            challenger: "bo".into(),
            target: "ada".into(),
            winner: "bo".into(),
        },
        Intent::BuyDrink {
            player: "cy".into(),
            drink: "shot".into(),
            quantity: 8,
        },
    ];

    for intent in script {
        match tavern.act(party, intent).await {
            Ok(response) => println!("{}", response.narrative),
            Err(err) => println!("{err}"),
        }
    }

    let snapshot = tavern.snapshot(party).await?;
    println!("\n=== Leaderboard ===");
    for noble in snapshot.leaderboard() {
        println!(
            "{:<8} soldiers {:>2}  coin {:>4}  drinks {:>2}",
            noble.name, noble.soldiers, noble.coin, noble.drinks
        );
    }
    if let Some(ruler) = snapshot.almighty_ruler() {
        println!("All hail {}, ruler of the party!", ruler.name);
    }

    let session = tavern.session(party).await?;
    let path = save_path(std::env::temp_dir(), &snapshot);
    session.lock().await.save(&path).await?;
    println!("\nSaved to {}", path.display());
    Ok(())
}
