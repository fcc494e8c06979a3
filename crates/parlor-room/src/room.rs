//! The game-server room: four slots, a rule set and a phase.
//!
//! `Room` is plain data plus the rules for changing it. It does no
//! locking and no I/O of its own: the [`RoomEngine`](crate::RoomEngine)
//! keeps each room behind its own mutex, and every notification is queued
//! on the players' outbound channels while that mutex is held, so all
//! occupants see membership changes in the same order.

use parlor_protocol::{GameEvent, Gid, RuleSet, Seat, SLOT_COUNT};
use rand::Rng;

use crate::{draw_turn_order, Human, Player, PlayerSender, RoomError, RoomPhase};

/// What a successful [`Room::add_player`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The slot the player now occupies.
    pub slot: usize,
    /// This join moved the room out of `WaitingForOwner`.
    pub owner_first: bool,
}

/// A snapshot of room metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub gid: Gid,
    pub owner: String,
    pub phase: RoomPhase,
    pub humans: usize,
    pub computers: usize,
    pub max_humans: usize,
}

/// One live room on a game server.
#[derive(Debug)]
pub struct Room {
    gid: Gid,
    owner: String,
    rules: RuleSet,
    phase: RoomPhase,
    slots: [Option<Player>; SLOT_COUNT],
    turn_order: Option<[usize; SLOT_COUNT]>,
}

impl Room {
    /// Builds a vacant room. Rules should already be validated.
    pub fn new(gid: Gid, owner: impl Into<String>, rules: RuleSet) -> Self {
        Self {
            gid,
            owner: owner.into(),
            rules,
            phase: RoomPhase::Vacant,
            slots: Default::default(),
            turn_order: None,
        }
    }

    pub fn gid(&self) -> Gid {
        self.gid
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn slots(&self) -> &[Option<Player>; SLOT_COUNT] {
        &self.slots
    }

    /// The assigned turn order, once the game has started.
    pub fn turn_order(&self) -> Option<[usize; SLOT_COUNT]> {
        self.turn_order
    }

    /// Number of occupied slots, humans and computers alike.
    pub fn occupied(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn human_count(&self) -> usize {
        self.humans().count()
    }

    /// Returns `true` when all four slots are empty.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Linear scan for the slot of the human named `username`.
    ///
    /// Backfilled computers never match, even when a human happens to go
    /// by the same name.
    pub fn player_index(&self, username: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(Player::Human(h)) if h.username == username))
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            gid: self.gid,
            owner: self.owner.clone(),
            phase: self.phase,
            humans: self.human_count(),
            computers: self.slots.iter().flatten().filter(|p| p.is_computer()).count(),
            max_humans: usize::from(self.rules.max_humans),
        }
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Vacant → WaitingForOwner. Called when an engine takes the room on.
    pub fn register(&mut self) -> Result<(), RoomError> {
        self.transition(RoomPhase::WaitingForOwner)
    }

    /// Seats `username` in the first empty slot.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`] unless waiting for the owner or
    ///   populating
    /// - [`RoomError::AlreadyInRoom`] if the user already has a seat
    /// - [`RoomError::OwnerNotJoined`] if the room is empty and the user
    ///   isn't the owner
    /// - [`RoomError::RoomFull`] if the human bound is reached
    /// - [`RoomError::WrongPassword`] for a non-owner with a bad password
    pub fn add_player(
        &mut self,
        username: &str,
        password: Option<&str>,
        sender: PlayerSender,
    ) -> Result<JoinOutcome, RoomError> {
        if !self.phase.is_joinable() {
            return Err(self.invalid_state());
        }
        if self.player_index(username).is_some() {
            return Err(RoomError::AlreadyInRoom {
                username: username.to_string(),
                gid: self.gid,
            });
        }
        let is_owner = username == self.owner;
        if self.human_count() == 0 && !is_owner {
            return Err(RoomError::OwnerNotJoined);
        }
        if self.human_count() >= usize::from(self.rules.max_humans) {
            return Err(RoomError::RoomFull(self.gid));
        }
        if !is_owner && !self.rules.password_matches(password) {
            return Err(RoomError::WrongPassword);
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(RoomError::RoomFull(self.gid))?;

        let human = Human::new(username.to_string(), is_owner, sender);

        // The newcomer learns the room as it stands, then everyone
        // (newcomer included) learns about the newcomer.
        human.send(GameEvent::RulesChanged {
            rules: self.rules.clone(),
        });
        for (index, player) in self.slots.iter().enumerate() {
            if let Some(Player::Human(other)) = player {
                human.send(self.joined_event(index, other));
            }
        }
        let joined = self.joined_event(slot, &human);
        self.slots[slot] = Some(Player::Human(human));
        self.broadcast(joined);

        let owner_first = self.phase == RoomPhase::WaitingForOwner;
        if owner_first {
            self.transition(RoomPhase::Populating)?;
        }
        self.check_ready();

        tracing::debug!(gid = %self.gid, %username, slot, "player seated");
        Ok(JoinOutcome { slot, owner_first })
    }

    /// Clears `username`'s slot and returns its index.
    ///
    /// Before the game starts, the owner leaving closes the room. At any
    /// point after the owner first sat down, the last human leaving closes
    /// it too.
    pub fn remove_player(&mut self, username: &str) -> Option<usize> {
        let slot = self.player_index(username)?;
        let player = self.slots[slot].take()?;
        if let Player::Human(human) = &player {
            human.disconnect();
        }
        self.broadcast(GameEvent::PlayerLeft {
            slot: slot as u8,
            username: username.to_string(),
        });

        let before_start = matches!(self.phase, RoomPhase::Populating | RoomPhase::Ready);
        if before_start && username == self.owner {
            self.close("the owner left");
        } else if self.human_count() == 0 && self.phase != RoomPhase::WaitingForOwner {
            self.close("everyone left");
        } else {
            self.check_ready();
        }

        tracing::debug!(gid = %self.gid, %username, slot, "player left");
        Some(slot)
    }

    /// Lets the human in `slot` take part. Owner only.
    pub fn admit(&mut self, requester: &str, slot: u8) -> Result<(), RoomError> {
        self.require_owner(requester)?;
        if self.phase != RoomPhase::Populating {
            return Err(self.invalid_state());
        }
        let Some(Some(Player::Human(human))) = self.slots.get_mut(usize::from(slot)) else {
            return Err(RoomError::InvalidSlot(slot));
        };
        if human.admitted {
            return Ok(());
        }
        human.admitted = true;
        self.broadcast(GameEvent::PlayerAdmitted { slot });
        self.check_ready();
        Ok(())
    }

    /// Owner's explicit start: unadmitted humans are dismissed and the
    /// room becomes Ready.
    pub fn begin(&mut self, requester: &str) -> Result<(), RoomError> {
        self.require_owner(requester)?;
        if self.phase != RoomPhase::Populating {
            return Err(self.invalid_state());
        }
        for slot in 0..SLOT_COUNT {
            let waiting = matches!(
                &self.slots[slot],
                Some(Player::Human(h)) if !h.admitted
            );
            if !waiting {
                continue;
            }
            if let Some(Player::Human(h)) = self.slots[slot].take() {
                h.send(GameEvent::Notice {
                    text: "the game started without you".into(),
                });
                h.disconnect();
                self.broadcast(GameEvent::PlayerLeft {
                    slot: slot as u8,
                    username: h.username,
                });
            }
        }
        self.transition(RoomPhase::Ready)
    }

    /// Replaces the rule set. Owner only, before the game starts.
    pub fn update_rules(&mut self, requester: &str, rules: RuleSet) -> Result<(), RoomError> {
        self.require_owner(requester)?;
        if !self.phase.is_joinable() {
            return Err(self.invalid_state());
        }
        rules
            .validate()
            .map_err(|e| RoomError::InvalidRules(e.to_string()))?;
        let humans = self.human_count();
        if usize::from(rules.max_humans) < humans {
            return Err(RoomError::InvalidRules(format!(
                "{humans} players are already seated"
            )));
        }
        self.rules = rules;
        self.broadcast(GameEvent::RulesChanged {
            rules: self.rules.clone(),
        });
        self.check_ready();
        Ok(())
    }

    /// Ready → InProgress: backfills empty slots with computers, draws a
    /// turn order and announces it to every human.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<[usize; SLOT_COUNT], RoomError> {
        if !self.phase.can_transition_to(RoomPhase::InProgress) {
            return Err(self.invalid_state());
        }
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(Player::Computer {
                    name: format!("Computer {}", index + 1),
                });
            }
        }

        let order = draw_turn_order(rng);
        let seats: Vec<Seat> = order
            .iter()
            .filter_map(|&index| {
                self.slots[index].as_ref().map(|p| Seat {
                    slot: index as u8,
                    name: p.name().to_string(),
                    computer: p.is_computer(),
                })
            })
            .collect();
        self.turn_order = Some(order);
        self.transition(RoomPhase::InProgress)?;
        self.broadcast(GameEvent::TurnOrder { seats });

        tracing::info!(gid = %self.gid, ?order, "turn order assigned");
        Ok(order)
    }

    /// InProgress → Closed on game completion.
    pub fn finish(&mut self) -> Result<(), RoomError> {
        if self.phase != RoomPhase::InProgress {
            return Err(self.invalid_state());
        }
        self.close("game over");
        Ok(())
    }

    /// Closes the room from any live phase, telling every human why.
    /// Returns `false` if it was already closed.
    pub fn close(&mut self, reason: &str) -> bool {
        if self.phase.is_closed() {
            return false;
        }
        for human in self.humans() {
            human.send(GameEvent::Notice {
                text: format!("room closed: {reason}"),
            });
            human.disconnect();
        }
        self.phase = RoomPhase::Closed;
        tracing::info!(gid = %self.gid, %reason, "room closed");
        true
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    fn humans(&self) -> impl Iterator<Item = &Human> {
        self.slots.iter().flatten().filter_map(Player::as_human)
    }

    fn broadcast(&self, event: GameEvent) {
        for human in self.humans() {
            human.send(event.clone());
        }
    }

    fn joined_event(&self, slot: usize, human: &Human) -> GameEvent {
        GameEvent::PlayerJoined {
            slot: slot as u8,
            username: human.username.clone(),
            owner: human.username == self.owner,
            admitted: human.admitted,
        }
    }

    /// Populating → Ready once every configured human seat is filled by
    /// an admitted player.
    fn check_ready(&mut self) {
        if self.phase != RoomPhase::Populating {
            return;
        }
        let admitted = self.humans().filter(|h| h.admitted).count();
        if admitted == self.human_count() && admitted == usize::from(self.rules.max_humans) {
            self.phase = RoomPhase::Ready;
        }
    }

    fn require_owner(&self, requester: &str) -> Result<(), RoomError> {
        if requester == self.owner {
            Ok(())
        } else {
            Err(RoomError::NotOwner)
        }
    }

    fn transition(&mut self, target: RoomPhase) -> Result<(), RoomError> {
        if !self.phase.can_transition_to(target) {
            return Err(self.invalid_state());
        }
        self.phase = target;
        Ok(())
    }

    fn invalid_state(&self) -> RoomError {
        RoomError::InvalidState {
            gid: self.gid,
            phase: self.phase,
        }
    }
}
