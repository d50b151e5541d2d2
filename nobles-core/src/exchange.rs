//! Role-exchange transitions between nobles and peasants.
//!
//! Every operation here runs inside a [`Transition`]: a scratch copy of the
//! party snapshot plus the list of effects recorded so far. Each effect is
//! applied to the scratch copy the moment it is emitted, so later steps of a
//! composite transition (a duel that demotes one noble and promotes a
//! peasant) see the earlier steps. Nothing touches the real party until the
//! caller replays the finished effect list with [`crate::rules::apply_effects`].
//! A step that fails throws the whole transition away.
//!
//! Soldier counts are never adjusted by deltas. Whenever an allegiance
//! pointer moves, the affected nobles are recounted from the pointers
//! themselves (one for the noble plus one per allied peasant).

use crate::party::{Party, Player, PlayerId, Status};
use crate::rules::{apply_effect, Effect, RuleError};
use tracing::info;

/// Pick the peasant who should take a vacated title.
///
/// Richest peasant first, then the one who has bought the most drinks,
/// then the alphabetically first name. `None` if there are no peasants.
pub fn find_new_noble_candidate<'a>(
    players: impl IntoIterator<Item = &'a Player>,
) -> Option<&'a Player> {
    players.into_iter().filter(|p| p.is_peasant()).max_by(|a, b| {
        a.coin
            .cmp(&b.coin)
            .then(a.drinks.cmp(&b.drinks))
            .then(b.name.cmp(&a.name))
    })
}

/// How a duel was settled, selected by the (winner, loser) roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelOutcome {
    /// Peasant beat peasant: the loser's coin changed hands.
    Robbery,
    /// Peasant beat noble: the winner took the loser's title.
    Usurpation,
    /// Noble beat peasant: the loser's coin changed hands and they joined the winner's army.
    Conscription,
    /// Noble beat noble: the loser was demoted and `successor` was promoted in their place.
    Regicide { successor: Option<PlayerId> },
}

/// A scratch copy of a party that records the effects applied to it.
#[derive(Debug, Clone)]
pub struct Transition {
    party: Party,
    effects: Vec<Effect>,
}

impl Transition {
    /// Start a transition from a snapshot of `party`.
    pub fn new(party: &Party) -> Self {
        Self {
            party: party.clone(),
            effects: Vec::new(),
        }
    }

    /// The scratch state, with every effect so far applied.
    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }

    pub(crate) fn emit(&mut self, effect: Effect) {
        apply_effect(&mut self.party, &effect);
        self.effects.push(effect);
    }

    fn require(&self, id: PlayerId) -> Result<&Player, RuleError> {
        self.party
            .player(id)
            .ok_or_else(|| RuleError::UnknownPlayer(id.to_string()))
    }

    fn require_status(&self, id: PlayerId, status: Status) -> Result<&Player, RuleError> {
        let player = self.require(id)?;
        if player.status != status {
            return Err(RuleError::InvalidRole {
                player: player.name.clone(),
                expected: status,
            });
        }
        Ok(player)
    }

    fn name_of(&self, id: PlayerId) -> String {
        self.party
            .player(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn set_allegiance(&mut self, player: PlayerId, noble: Option<PlayerId>) {
        let Some(previous) = self.party.player(player).map(|p| p.allegiance) else {
            return;
        };
        if previous != noble {
            self.emit(Effect::AllegianceChanged {
                player,
                previous,
                noble,
            });
        }
    }

    fn recount_soldiers(&mut self, player: PlayerId) {
        let Some(stored) = self.party.player(player).map(|p| p.soldiers) else {
            return;
        };
        let soldiers = self.party.expected_soldiers(player);
        if stored != soldiers {
            self.emit(Effect::SoldiersRecounted {
                noble: player,
                soldiers,
            });
        }
    }

    /// Move all of `loser`'s coin to `winner`, returning the amount moved.
    pub fn transfer_all_money(
        &mut self,
        winner: PlayerId,
        loser: PlayerId,
    ) -> Result<u64, RuleError> {
        self.require(winner)?;
        let amount = self.require(loser)?.coin;
        if amount > 0 && winner != loser {
            self.emit(Effect::CoinTransferred {
                from: loser,
                to: winner,
                amount,
            });
        }
        Ok(amount)
    }

    /// Hand `deposed`'s title, treasury and subjects to `promotee`.
    ///
    /// `promotee` must be a peasant and `deposed` a noble. Afterwards the
    /// promotee is a noble holding at least the configured noble starting
    /// coin, and the deposed noble is an unallied peasant with no soldiers
    /// and no ban list.
    pub fn promote_peasant_to_noble(
        &mut self,
        promotee: PlayerId,
        deposed: PlayerId,
    ) -> Result<(), RuleError> {
        let previous_noble = self.require_status(promotee, Status::Peasant)?.allegiance;
        self.require_status(deposed, Status::Noble)?;

        self.transfer_all_money(promotee, deposed)?;

        // Leave whichever army the promotee served in
        self.set_allegiance(promotee, None);
        if let Some(previous) = previous_noble.filter(|&n| n != deposed) {
            self.recount_soldiers(previous);
        }

        let subjects: Vec<_> = self.party.subjects_of(deposed).map(|p| p.id).collect();
        for subject in subjects {
            self.set_allegiance(subject, Some(promotee));
        }

        self.emit(Effect::StatusChanged {
            player: promotee,
            status: Status::Noble,
        });
        let stake = self.party.config.starting_coin.noble;
        let coin = self.require(promotee)?.coin;
        if coin < stake {
            self.emit(Effect::CoinFloored {
                player: promotee,
                previous: coin,
                new_total: stake,
            });
        }
        self.recount_soldiers(promotee);

        self.demote_noble(deposed)?;

        info!(
            promotee = %self.name_of(promotee),
            deposed = %self.name_of(deposed),
            soldiers = self.party.expected_soldiers(promotee),
            "peasant promoted to noble"
        );
        Ok(())
    }

    /// Promote the best [`find_new_noble_candidate`] in place of `deposed`.
    pub fn promote_richest_peasant(&mut self, deposed: PlayerId) -> Result<PlayerId, RuleError> {
        self.require_status(deposed, Status::Noble)?;
        let candidate = find_new_noble_candidate(&self.party.players)
            .map(|p| p.id)
            .ok_or(RuleError::NoEligiblePeasant)?;
        self.promote_peasant_to_noble(candidate, deposed)?;
        Ok(candidate)
    }

    /// Strip `noble` of their title. Any remaining subjects become unallied
    /// and every ban the noble issued is dropped.
    pub fn demote_noble(&mut self, noble: PlayerId) -> Result<(), RuleError> {
        self.require_status(noble, Status::Noble)?;

        let subjects: Vec<_> = self.party.subjects_of(noble).map(|p| p.id).collect();
        for subject in subjects {
            self.set_allegiance(subject, None);
        }

        self.emit(Effect::StatusChanged {
            player: noble,
            status: Status::Peasant,
        });
        self.set_allegiance(noble, None);
        self.recount_soldiers(noble);

        let count = self.party.outlaws.banned_by(noble).count();
        if count > 0 {
            self.emit(Effect::OutlawsPurged { noble, count });
        }

        info!(noble = %self.name_of(noble), purged_bans = count, "noble demoted");
        Ok(())
    }

    /// Settle a duel between `winner` and `loser`.
    pub fn resolve_duel(
        &mut self,
        winner: PlayerId,
        loser: PlayerId,
    ) -> Result<DuelOutcome, RuleError> {
        if winner == loser {
            return Err(RuleError::SelfTargeting("assassinate"));
        }
        let winner_status = self.require(winner)?.status;
        let loser_status = self.require(loser)?.status;

        match (winner_status, loser_status) {
            (Status::Peasant, Status::Peasant) => {
                self.transfer_all_money(winner, loser)?;
                Ok(DuelOutcome::Robbery)
            }
            (Status::Peasant, Status::Noble) => {
                self.promote_peasant_to_noble(winner, loser)?;
                Ok(DuelOutcome::Usurpation)
            }
            (Status::Noble, Status::Peasant) => {
                self.conscript(winner, loser)?;
                Ok(DuelOutcome::Conscription)
            }
            (Status::Noble, Status::Noble) => {
                self.transfer_all_money(winner, loser)?;

                let subjects: Vec<_> = self.party.subjects_of(loser).map(|p| p.id).collect();
                for subject in subjects {
                    self.set_allegiance(subject, Some(winner));
                }
                self.recount_soldiers(winner);
                self.recount_soldiers(loser);

                // The loser is still a noble here, so never their own successor
                let successor = find_new_noble_candidate(&self.party.players).map(|p| p.id);
                match successor {
                    Some(successor) => self.promote_peasant_to_noble(successor, loser)?,
                    None => self.demote_noble(loser)?,
                }
                Ok(DuelOutcome::Regicide { successor })
            }
        }
    }

    /// A noble takes a defeated peasant's coin and drafts them into their army.
    ///
    /// The noble's ban list does not apply here; bans only block voluntary pledges.
    fn conscript(&mut self, noble: PlayerId, peasant: PlayerId) -> Result<(), RuleError> {
        self.require_status(noble, Status::Noble)?;
        let previous_noble = self.require_status(peasant, Status::Peasant)?.allegiance;

        self.transfer_all_money(noble, peasant)?;
        self.set_allegiance(peasant, Some(noble));
        if let Some(previous) = previous_noble.filter(|&n| n != noble) {
            self.recount_soldiers(previous);
        }
        self.recount_soldiers(noble);
        Ok(())
    }

    /// `player` swears allegiance to `noble`, leaving any previous noble.
    pub fn pledge_allegiance(
        &mut self,
        player: PlayerId,
        noble: PlayerId,
    ) -> Result<(), RuleError> {
        if player == noble {
            return Err(RuleError::SelfTargeting("pledge allegiance to"));
        }
        let noble_name = self.require_status(noble, Status::Noble)?.name.clone();
        let pledger = self.require_status(player, Status::Peasant)?;
        let previous_noble = pledger.allegiance;
        if self.party.outlaws.is_banned(noble, player) {
            return Err(RuleError::Banned {
                noble: noble_name,
                peasant: pledger.name.clone(),
            });
        }

        self.set_allegiance(player, Some(noble));
        if let Some(previous) = previous_noble.filter(|&n| n != noble) {
            self.recount_soldiers(previous);
        }
        self.recount_soldiers(noble);
        Ok(())
    }

    /// `noble` bans `peasant` from their kingdom, expelling them if allied.
    ///
    /// Returns `false` if the ban was already on record.
    pub fn ban(&mut self, noble: PlayerId, peasant: PlayerId) -> Result<bool, RuleError> {
        if noble == peasant {
            return Err(RuleError::SelfTargeting("ban"));
        }
        self.require_status(noble, Status::Noble)?;
        let allied = self.require(peasant)?.allegiance == Some(noble);

        if allied {
            self.set_allegiance(peasant, None);
            self.recount_soldiers(noble);
        }

        let fresh = !self.party.outlaws.is_banned(noble, peasant);
        if fresh {
            self.emit(Effect::OutlawRecorded { noble, peasant });
        }

        info!(
            noble = %self.name_of(noble),
            peasant = %self.name_of(peasant),
            expelled = allied,
            "peasant banned"
        );
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartyConfig;
    use crate::rules::apply_effects;

    fn party_of(players: Vec<Player>) -> Party {
        Party::new("Test", PartyConfig::default()).with_players(players)
    }

    fn ally(peasant: &mut Player, noble: &mut Player) {
        peasant.allegiance = Some(noble.id);
        noble.soldiers += 1;
    }

    fn id(party: &Party, name: &str) -> PlayerId {
        party.find(name).unwrap().id
    }

    #[test]
    fn test_candidate_prefers_coin_then_drinks_then_name() {
        let mut a = Player::peasant("anna", 30);
        let mut b = Player::peasant("bob", 30);
        let c = Player::peasant("cara", 10);
        let n = Player::noble("nina", 500);
        assert_eq!(find_new_noble_candidate([&a, &b, &c, &n]).unwrap().name, "anna");

        b.drinks = 2;
        assert_eq!(find_new_noble_candidate([&a, &b, &c, &n]).unwrap().name, "bob");

        a.coin = 31;
        assert_eq!(find_new_noble_candidate([&a, &b, &c, &n]).unwrap().name, "anna");

        assert!(find_new_noble_candidate([&n]).is_none());
    }

    #[test]
    fn test_transfer_all_money_skips_empty_purse() {
        let party = party_of(vec![Player::peasant("a", 10), Player::peasant("b", 0)]);
        let mut tx = Transition::new(&party);
        assert_eq!(tx.transfer_all_money(id(&party, "a"), id(&party, "b")).unwrap(), 0);
        assert!(tx.effects().is_empty());

        assert_eq!(tx.transfer_all_money(id(&party, "b"), id(&party, "a")).unwrap(), 10);
        assert_eq!(tx.party().find("a").unwrap().coin, 0);
        assert_eq!(tx.party().find("b").unwrap().coin, 10);
    }

    #[test]
    fn test_promotion_moves_subjects_and_purges_bans() {
        let mut noble = Player::noble("b", 40);
        let mut c = Player::peasant("c", 1);
        let mut d = Player::peasant("d", 1);
        ally(&mut c, &mut noble);
        ally(&mut d, &mut noble);
        let a = Player::peasant("a", 100);
        let outcast = Player::peasant("x", 0);
        let mut party = party_of(vec![a, noble, c, d, outcast]);
        party.outlaws.record(id(&party, "b"), id(&party, "x"));

        let mut tx = Transition::new(&party);
        tx.promote_peasant_to_noble(id(&party, "a"), id(&party, "b"))
            .unwrap();
        let effects = tx.into_effects();
        apply_effects(&mut party, &effects);

        let a = party.find("a").unwrap();
        assert_eq!(a.status, Status::Noble);
        assert_eq!(a.coin, 140);
        assert_eq!(a.soldiers, 3);
        assert_eq!(a.allegiance, None);

        let b = party.find("b").unwrap();
        assert_eq!(b.status, Status::Peasant);
        assert_eq!(b.soldiers, 0);
        assert_eq!(b.coin, 0);
        assert!(party.outlaws.is_empty());

        assert_eq!(party.find("c").unwrap().allegiance, Some(a.id));
        assert_eq!(party.check_invariants(), Ok(()));
    }

    #[test]
    fn test_promotion_leaves_previous_army() {
        let mut other = Player::noble("other", 100);
        let mut promotee = Player::peasant("p", 5);
        ally(&mut promotee, &mut other);
        let deposed = Player::noble("deposed", 0);
        let party = party_of(vec![other, promotee, deposed]);

        let mut tx = Transition::new(&party);
        tx.promote_peasant_to_noble(id(&party, "p"), id(&party, "deposed"))
            .unwrap();

        let scratch = tx.party();
        assert_eq!(scratch.find("other").unwrap().soldiers, 1);
        // Floored up to the noble starting stake
        assert_eq!(scratch.find("p").unwrap().coin, 100);
        assert_eq!(scratch.find("p").unwrap().soldiers, 1);
        assert!(tx
            .effects()
            .iter()
            .any(|e| matches!(e, Effect::CoinFloored { previous: 5, new_total: 100, .. })));
        assert_eq!(scratch.check_invariants(), Ok(()));
    }

    #[test]
    fn test_promotion_rejects_wrong_roles() {
        let party = party_of(vec![Player::noble("n", 10), Player::noble("m", 10)]);
        let mut tx = Transition::new(&party);
        assert!(matches!(
            tx.promote_peasant_to_noble(id(&party, "n"), id(&party, "m")),
            Err(RuleError::InvalidRole {
                expected: Status::Peasant,
                ..
            })
        ));
        assert!(matches!(
            tx.promote_richest_peasant(id(&party, "n")),
            Err(RuleError::NoEligiblePeasant)
        ));
        assert!(tx.effects().is_empty());
    }

    #[test]
    fn test_pledge_switches_armies() {
        let first = Player::noble("first", 100);
        let second = Player::noble("second", 100);
        let peasant = Player::peasant("p", 0);
        let party = party_of(vec![first, second, peasant]);

        let mut tx = Transition::new(&party);
        tx.pledge_allegiance(id(&party, "p"), id(&party, "first"))
            .unwrap();
        tx.pledge_allegiance(id(&party, "p"), id(&party, "second"))
            .unwrap();

        let scratch = tx.party();
        assert_eq!(scratch.find("first").unwrap().soldiers, 1);
        assert_eq!(scratch.find("second").unwrap().soldiers, 2);
        assert_eq!(scratch.check_invariants(), Ok(()));
    }

    #[test]
    fn test_pledge_rejections() {
        let noble = Player::noble("n", 100);
        let other = Player::noble("o", 100);
        let peasant = Player::peasant("p", 0);
        let mut party = party_of(vec![noble, other, peasant]);
        party.outlaws.record(id(&party, "n"), id(&party, "p"));

        let mut tx = Transition::new(&party);
        assert!(matches!(
            tx.pledge_allegiance(id(&party, "p"), id(&party, "p")),
            Err(RuleError::SelfTargeting(_))
        ));
        assert!(matches!(
            tx.pledge_allegiance(id(&party, "o"), id(&party, "n")),
            Err(RuleError::InvalidRole {
                expected: Status::Peasant,
                ..
            })
        ));
        assert!(matches!(
            tx.pledge_allegiance(id(&party, "n"), id(&party, "p")),
            Err(RuleError::InvalidRole {
                expected: Status::Noble,
                ..
            })
        ));
        let err = tx
            .pledge_allegiance(id(&party, "p"), id(&party, "n"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsuccessful! n has banned p from their kingdom!");
        assert!(tx.effects().is_empty());
    }

    #[test]
    fn test_ban_expels_and_is_idempotent() {
        let mut noble = Player::noble("n", 100);
        let mut peasant = Player::peasant("p", 0);
        ally(&mut peasant, &mut noble);
        let party = party_of(vec![noble, peasant]);

        let mut tx = Transition::new(&party);
        assert!(tx.ban(id(&party, "n"), id(&party, "p")).unwrap());
        assert!(!tx.ban(id(&party, "n"), id(&party, "p")).unwrap());

        let scratch = tx.party();
        assert_eq!(scratch.find("p").unwrap().allegiance, None);
        assert_eq!(scratch.find("n").unwrap().soldiers, 1);
        assert!(scratch.outlaws.is_banned(id(&party, "n"), id(&party, "p")));
    }

    #[test]
    fn test_noble_beats_noble_promotes_fresh_peasant() {
        let mut winner = Player::noble("w", 50);
        let mut loser = Player::noble("l", 30);
        let mut s = Player::peasant("s", 5);
        let mut rich = Player::peasant("rich", 60);
        ally(&mut s, &mut loser);
        ally(&mut rich, &mut winner);
        let party = party_of(vec![winner, loser, s, rich]);

        let mut tx = Transition::new(&party);
        let outcome = tx.resolve_duel(id(&party, "w"), id(&party, "l")).unwrap();
        assert_eq!(
            outcome,
            DuelOutcome::Regicide {
                successor: Some(id(&party, "rich"))
            }
        );

        let scratch = tx.party();
        let w = scratch.find("w").unwrap();
        assert_eq!(w.coin, 80);
        assert_eq!(w.soldiers, 2);
        assert_eq!(scratch.find("s").unwrap().allegiance, Some(w.id));
        assert_eq!(scratch.find("l").unwrap().status, Status::Peasant);
        assert_eq!(scratch.find("rich").unwrap().status, Status::Noble);
        assert_eq!(scratch.find("rich").unwrap().coin, 100);
        assert_eq!(scratch.check_invariants(), Ok(()));
    }

    #[test]
    fn test_noble_beats_noble_without_peasants() {
        let party = party_of(vec![Player::noble("w", 10), Player::noble("l", 10)]);
        let mut tx = Transition::new(&party);
        let outcome = tx.resolve_duel(id(&party, "w"), id(&party, "l")).unwrap();
        assert_eq!(outcome, DuelOutcome::Regicide { successor: None });
        assert_eq!(tx.party().nobles().count(), 1);
        assert_eq!(tx.party().check_invariants(), Ok(()));
    }

    #[test]
    fn test_noble_conscripts_defeated_peasant() {
        let mut other = Player::noble("other", 100);
        let winner = Player::noble("w", 10);
        let mut loser = Player::peasant("l", 7);
        ally(&mut loser, &mut other);
        let party = party_of(vec![other, winner, loser]);

        let mut tx = Transition::new(&party);
        let outcome = tx.resolve_duel(id(&party, "w"), id(&party, "l")).unwrap();
        assert_eq!(outcome, DuelOutcome::Conscription);

        let scratch = tx.party();
        assert_eq!(scratch.find("w").unwrap().coin, 17);
        assert_eq!(scratch.find("w").unwrap().soldiers, 2);
        assert_eq!(scratch.find("other").unwrap().soldiers, 1);
        assert_eq!(scratch.find("l").unwrap().allegiance, Some(id(&party, "w")));
    }
}
