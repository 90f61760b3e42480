//! Race control messages: flags, safety cars and the chequered flag.

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use super::entries;
use super::leader::rebroadcast_leader;
use crate::event::{RawEvent, category};
use crate::state::SessionState;
use crate::topics::{FlagPayload, Outbox, Topic, encode};
use crate::types::{RaceState, Sector, SessionType};
use crate::Result;

pub const ALL_YELLOW_CLEARED: &str = "GREEN FLAG, ALL YELLOW CLEARED";
pub const SAFETY_CAR_ENDING: &str = "SAFETY CAR ENDING";
pub const RED_FLAG_CLEARED: &str = "GREEN FLAG, RED flag cleared";

/// Apply every entry of a `RaceControlMessages` event to the race state.
pub fn process_race_control(
    event: &RawEvent,
    state: &mut SessionState,
    now: Instant,
    outbox: &mut dyn Outbox,
) -> Result<()> {
    if !event.is(category::RACE_CONTROL_MESSAGES) {
        return Ok(());
    }

    for message in entries(event.payload.get("Messages")) {
        if !message.is_object() {
            continue;
        }
        let text = message.get("Message").and_then(Value::as_str).unwrap_or_default();

        if let Some(flag) = message.get("Flag") {
            if text.is_empty() {
                continue;
            }
            if let Some(flag) = flag.as_str() {
                apply_flag(flag, text, message, state, now, outbox)?;
            }
        } else if message.get("Category").and_then(Value::as_str) == Some("SafetyCar") {
            apply_safety_car(message, state, outbox)?;
        }
    }
    Ok(())
}

fn apply_flag(
    flag: &str,
    text: &str,
    message: &Value,
    state: &mut SessionState,
    now: Instant,
    outbox: &mut dyn Outbox,
) -> Result<()> {
    match flag {
        // Procedural, not a race state change
        "GREEN" if text.contains("PIT EXIT OPEN") => {}
        "RED" => {
            if state.race_state != RaceState::Red {
                info!("RED flag: {}", text);
                state.set_race_state(RaceState::Red);
                state.clear_yellow_flags();
                outbox.enqueue(Topic::FlagStatus, encode(&FlagPayload::new(flag, text))?)?;
            }
        }
        "YELLOW" | "DOUBLE YELLOW" => {
            if state.race_state.accepts_local_yellow() {
                let sector = Sector::from_value(message.get("Sector"));
                state.add_yellow_sector(sector);
                if state.race_state != RaceState::Yellow {
                    info!(%sector, "{} flag: {}", flag, text);
                    state.set_race_state(RaceState::Yellow);
                    outbox.enqueue(Topic::FlagStatus, encode(&FlagPayload::new(flag, text))?)?;
                } else {
                    let yellow_sectors = state.yellow_flags.len();
                    debug!(%sector, yellow_sectors, "Additional yellow sector");
                }
            }
        }
        "CLEAR" => {
            if state.race_state == RaceState::Yellow {
                let sector = Sector::from_value(message.get("Sector"));
                state.remove_yellow_sector(sector);
                if state.yellow_flags.is_empty() {
                    return_to_green(state, outbox, ALL_YELLOW_CLEARED)?;
                }
            }
        }
        "CHEQUERED" => {
            if state.session_type() == SessionType::Qualifying && !state.cooldown_active {
                info!("CHEQUERED flag for {}", state.quali_session);
                state.begin_cooldown(now);
            }
        }
        other => debug!("Ignoring {} flag: {}", other, text),
    }
    Ok(())
}

fn apply_safety_car(
    message: &Value,
    state: &mut SessionState,
    outbox: &mut dyn Outbox,
) -> Result<()> {
    let status = message.get("Status").and_then(Value::as_str).unwrap_or_default();
    match status {
        "DEPLOYED" => {
            if matches!(state.race_state, RaceState::SafetyCar | RaceState::Red) {
                return Ok(());
            }
            let mode = message.get("Mode").and_then(Value::as_str).unwrap_or("SAFETY CAR");
            info!("{} deployed", mode);
            state.set_race_state(RaceState::SafetyCar);
            state.clear_yellow_flags();
            outbox.enqueue(
                Topic::FlagStatus,
                encode(&FlagPayload::new(RaceState::SafetyCar.as_str(), mode))?,
            )?;
        }
        "ENDING" | "IN THIS LAP" => {
            // A red flag is only lifted by a restart
            if state.race_state != RaceState::Red {
                return_to_green(state, outbox, SAFETY_CAR_ENDING)?;
            }
        }
        other => debug!("Ignoring safety car status {:?}", other),
    }
    Ok(())
}

/// Return the session to green, then re-publish the leader so subscribers that
/// muted during the incident regain leader context.
pub fn return_to_green(
    state: &mut SessionState,
    outbox: &mut dyn Outbox,
    message: &str,
) -> Result<()> {
    info!("Returning to GREEN from {}", state.race_state);
    state.set_race_state(RaceState::Green);
    state.clear_yellow_flags();
    let payload = encode(&FlagPayload::new(RaceState::Green.as_str(), message))?;
    outbox.enqueue(Topic::FlagStatus, payload)?;
    rebroadcast_leader(state, outbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::parse_line;
    use crate::reference::fixtures::reference_data;
    use crate::topics::OutboundMessage;
    use proptest::prelude::*;
    use std::sync::Arc;

    const YELLOW_S2: &str = "['RaceControlMessages', {'Messages': {'56': \
        {'Utc': '2025-07-05T11:39:56', 'Category': 'Flag', 'Flag': 'YELLOW', 'Scope': 'Sector', \
        'Sector': 2, 'Message': 'YELLOW IN TRACK SECTOR 2'}}}, '2025-07-05T11:39:56.262Z']";
    const CLEAR_S2: &str = "['RaceControlMessages', {'Messages': {'13': \
        {'Utc': '2025-09-06T14:22:44', 'Category': 'Flag', 'Flag': 'CLEAR', 'Scope': 'Sector', \
        'Sector': 2, 'Message': 'CLEAR IN TRACK SECTOR 2'}}}, '2025-09-06T14:22:43.772Z']";
    const RED_FLAG: &str = "['RaceControlMessages', {'Messages': {'50': \
        {'Utc': '2025-07-05T11:33:58', 'Category': 'Flag', 'Flag': 'RED', 'Scope': 'Track', \
        'Message': 'RED FLAG'}}}, '2025-07-05T11:33:58.102Z']";
    const SC_DEPLOYED: &str = "['RaceControlMessages', {'Messages': {'97': \
        {'Utc': '2025-07-06T14:29:14', 'Lap': 14, 'Category': 'SafetyCar', 'Status': 'DEPLOYED', \
        'Mode': 'SAFETY CAR', 'Message': 'SAFETY CAR DEPLOYED'}}}, '2025-07-06T14:29:14.267Z']";
    const SC_IN_THIS_LAP: &str = "['RaceControlMessages', {'Messages': {'99': \
        {'Utc': '2025-07-06T14:38:36', 'Lap': 17, 'Category': 'SafetyCar', \
        'Status': 'IN THIS LAP', 'Mode': 'SAFETY CAR', 'Message': 'SAFETY CAR IN THIS LAP'}}}, \
        '2025-07-06T14:38:36.526Z']";
    const VSC_DEPLOYED: &str = "['RaceControlMessages', {'Messages': {'67': \
        {'Utc': '2025-07-06T14:05:48', 'Lap': 2, 'Category': 'SafetyCar', 'Status': 'DEPLOYED', \
        'Mode': 'VIRTUAL SAFETY CAR', 'Message': 'VIRTUAL SAFETY CAR DEPLOYED'}}}, \
        '2025-07-06T14:05:47.647Z']";
    const VSC_ENDING: &str = "['RaceControlMessages', {'Messages': {'72': \
        {'Utc': '2025-07-06T14:10:18', 'Lap': 4, 'Category': 'SafetyCar', 'Status': 'ENDING', \
        'Mode': 'VIRTUAL SAFETY CAR', 'Message': 'VIRTUAL SAFETY CAR ENDING'}}}, \
        '2025-07-06T14:10:17.861Z']";
    const PIT_EXIT_OPEN: &str = "['RaceControlMessages', {'Messages': {'1': {'Category': 'Flag', \
        'Flag': 'GREEN', 'Scope': 'Track', 'Message': 'GREEN LIGHT - PIT EXIT OPEN'}}}, 'ts']";
    const CHEQUERED: &str = "['RaceControlMessages', {'Messages': {'14': \
        {'Utc': '2025-07-05T14:27:49', 'Category': 'Flag', 'Flag': 'CHEQUERED', 'Scope': 'Track', \
        'Message': 'CHEQUERED FLAG'}}}, '2025-07-05T14:27:49.153Z']";

    fn state(session_type: SessionType) -> SessionState {
        SessionState::new(session_type, Arc::new(reference_data()))
    }

    fn run(line: &str, state: &mut SessionState, outbox: &mut Vec<OutboundMessage>) {
        process_race_control(&parse_line(line).unwrap(), state, Instant::now(), outbox).unwrap();
    }

    fn sector_flag(flag: &str, sector: u32) -> String {
        format!(
            "['RaceControlMessages', {{'Messages': {{'1': {{'Category': 'Flag', 'Flag': '{0}', \
             'Sector': {1}, 'Message': '{0} IN TRACK SECTOR {1}'}}}}}}, 'ts']",
            flag, sector
        )
    }

    fn yellow(sector: u32) -> String {
        sector_flag("YELLOW", sector)
    }

    fn double_yellow(sector: u32) -> String {
        sector_flag("DOUBLE YELLOW", sector)
    }

    fn clear(sector: u32) -> String {
        sector_flag("CLEAR", sector)
    }

    fn flag(topic_payload: &OutboundMessage) -> FlagPayload {
        assert_eq!(topic_payload.topic, Topic::FlagStatus);
        serde_json::from_str(&topic_payload.payload).unwrap()
    }

    #[test]
    fn yellow_then_clear_returns_to_green_and_rebroadcasts_leader() {
        let mut state = state(SessionType::Race);
        let ver = state.reference().lookup("1").unwrap();
        state.set_session_lead(&ver);
        let mut outbox = Vec::new();

        run(YELLOW_S2, &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::Yellow);
        assert!(state.yellow_flags.contains(&Sector(Some(2))));
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].payload, r#"{"flag":"YELLOW","message":"YELLOW IN TRACK SECTOR 2"}"#);

        run(CLEAR_S2, &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::Green);
        assert!(state.yellow_flags.is_empty());
        assert_eq!(outbox.len(), 3);
        assert_eq!(flag(&outbox[1]), FlagPayload::new("GREEN", ALL_YELLOW_CLEARED));
        assert_eq!(outbox[2].topic, Topic::Leader);
    }

    #[test]
    fn multiple_yellow_sectors_resolve_independently() {
        let mut state = state(SessionType::Race);
        let mut outbox = Vec::new();

        run(&yellow(2), &mut state, &mut outbox);
        run(&yellow(5), &mut state, &mut outbox);
        assert_eq!(outbox.len(), 1, "additional sectors do not re-emit");

        run(&clear(2), &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::Yellow);
        assert_eq!(outbox.len(), 1);

        run(&clear(5), &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::Green);
        // No leader known yet, so only the flag goes out
        assert_eq!(outbox.len(), 2);
    }

    #[test]
    fn double_yellow_sets_yellow_once_and_clears_by_sector() {
        let mut state = state(SessionType::Race);
        let mut outbox = Vec::new();

        run(&double_yellow(1), &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::Yellow);
        assert!(state.yellow_flags.contains(&Sector(Some(1))));
        assert_eq!(outbox.len(), 1);
        assert_eq!(
            flag(&outbox[0]),
            FlagPayload::new("DOUBLE YELLOW", "DOUBLE YELLOW IN TRACK SECTOR 1")
        );

        run(&double_yellow(1), &mut state, &mut outbox);
        assert_eq!(outbox.len(), 1, "a repeated double yellow does not re-emit");

        run(&clear(1), &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::Green);
        assert!(state.yellow_flags.is_empty());
        assert_eq!(outbox.len(), 2);
        assert_eq!(flag(&outbox[1]), FlagPayload::new("GREEN", ALL_YELLOW_CLEARED));
    }

    #[test]
    fn clear_outside_yellow_is_ignored() {
        let mut state = state(SessionType::Race);
        let mut outbox = Vec::new();
        run(&clear(2), &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::Green);
        assert!(outbox.is_empty());
    }

    #[test]
    fn red_flag_is_idempotent() {
        let mut state = state(SessionType::Race);
        let mut outbox = Vec::new();

        run(&yellow(3), &mut state, &mut outbox);
        run(RED_FLAG, &mut state, &mut outbox);
        run(RED_FLAG, &mut state, &mut outbox);

        assert_eq!(state.race_state, RaceState::Red);
        assert!(state.yellow_flags.is_empty());
        let reds: Vec<_> = outbox.iter().map(flag).filter(|f| f.flag == "RED").collect();
        assert_eq!(reds, vec![FlagPayload::new("RED", "RED FLAG")]);
    }

    #[test]
    fn yellow_is_ignored_under_red_and_safety_car() {
        for blocking in [RaceState::Red, RaceState::SafetyCar] {
            let mut state = state(SessionType::Race);
            state.set_race_state(blocking);
            let mut outbox = Vec::new();

            run(&yellow(1), &mut state, &mut outbox);

            assert_eq!(state.race_state, blocking);
            assert!(state.yellow_flags.is_empty());
            assert!(outbox.is_empty());
        }
    }

    #[test]
    fn safety_car_deployed_then_in_this_lap() {
        let mut state = state(SessionType::Race);
        let ver = state.reference().lookup("1").unwrap();
        state.set_session_lead(&ver);
        let mut outbox = Vec::new();

        run(&yellow(2), &mut state, &mut outbox);
        run(SC_DEPLOYED, &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::SafetyCar);
        assert!(state.yellow_flags.is_empty());
        assert_eq!(flag(&outbox[1]), FlagPayload::new("SAFETY CAR", "SAFETY CAR"));

        run(SC_IN_THIS_LAP, &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::Green);
        assert_eq!(flag(&outbox[2]), FlagPayload::new("GREEN", "SAFETY CAR ENDING"));
        assert_eq!(outbox[3].topic, Topic::Leader);
        assert_eq!(outbox.len(), 4);
    }

    #[test]
    fn virtual_safety_car_reports_its_mode() {
        let mut state = state(SessionType::Race);
        let mut outbox = Vec::new();

        run(VSC_DEPLOYED, &mut state, &mut outbox);
        run(VSC_DEPLOYED, &mut state, &mut outbox);
        assert_eq!(outbox.len(), 1);
        assert_eq!(flag(&outbox[0]), FlagPayload::new("SAFETY CAR", "VIRTUAL SAFETY CAR"));

        run(VSC_ENDING, &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::Green);
        assert_eq!(flag(&outbox[1]), FlagPayload::new("GREEN", "SAFETY CAR ENDING"));
    }

    #[test]
    fn red_flag_is_not_lifted_by_safety_car_messages() {
        let mut state = state(SessionType::Race);
        state.set_race_state(RaceState::Red);
        let mut outbox = Vec::new();

        run(SC_DEPLOYED, &mut state, &mut outbox);
        run(SC_IN_THIS_LAP, &mut state, &mut outbox);

        assert_eq!(state.race_state, RaceState::Red);
        assert!(outbox.is_empty());
    }

    #[test]
    fn pit_exit_green_is_procedural() {
        let mut state = state(SessionType::Practice);
        let before = state.clone();
        let mut outbox = Vec::new();
        run(PIT_EXIT_OPEN, &mut state, &mut outbox);
        assert_eq!(state, before);
        assert!(outbox.is_empty());
    }

    #[test]
    fn chequered_only_starts_cooldown_in_qualifying() {
        let mut race = state(SessionType::Race);
        let mut outbox = Vec::new();
        run(CHEQUERED, &mut race, &mut outbox);
        assert!(!race.cooldown_active);

        let mut quali = state(SessionType::Qualifying);
        let now = Instant::now();
        let chequered = parse_line(CHEQUERED).unwrap();
        process_race_control(&chequered, &mut quali, now, &mut outbox).unwrap();
        assert!(quali.cooldown_active);
        assert_eq!(quali.session_end_time, Some(now));
        assert_eq!(quali.race_state, RaceState::Green);
        assert!(outbox.is_empty());

        // A repeated chequered flag keeps the original end time
        let later = now + std::time::Duration::from_secs(5);
        process_race_control(&chequered, &mut quali, later, &mut outbox).unwrap();
        assert_eq!(quali.session_end_time, Some(now));
    }

    #[test]
    fn messages_in_list_form_are_processed_in_order() {
        let mut state = state(SessionType::Race);
        let mut outbox = Vec::new();
        let line = "['RaceControlMessages', {'Messages': [\
            {'Category': 'Flag', 'Flag': 'YELLOW', 'Sector': 4, \
            'Message': 'YELLOW IN TRACK SECTOR 4'}, \
            {'Category': 'Flag', 'Flag': 'CLEAR', 'Sector': 4, \
            'Message': 'CLEAR IN TRACK SECTOR 4'}, \
            'not a message']}, 'ts']";

        run(line, &mut state, &mut outbox);

        assert_eq!(state.race_state, RaceState::Green);
        assert_eq!(outbox.len(), 2);
    }

    #[test]
    fn flag_without_message_text_is_skipped() {
        let mut state = state(SessionType::Race);
        let mut outbox = Vec::new();
        let line = "['RaceControlMessages', {'Messages': {'1': {'Category': 'Flag', \
            'Flag': 'RED', 'Message': ''}}}, 'ts']";
        run(line, &mut state, &mut outbox);
        assert_eq!(state.race_state, RaceState::Green);
    }

    fn arb_message() -> impl Strategy<Value = String> {
        prop_oneof![
            (1u32..4).prop_map(yellow),
            (1u32..4).prop_map(double_yellow),
            (1u32..4).prop_map(clear),
            Just(RED_FLAG.to_string()),
            Just(SC_DEPLOYED.to_string()),
            Just(VSC_DEPLOYED.to_string()),
            Just(SC_IN_THIS_LAP.to_string()),
            Just(PIT_EXIT_OPEN.to_string()),
        ]
    }

    proptest! {
        #[test]
        fn state_machine_guards_hold_for_any_sequence(
            lines in prop::collection::vec(arb_message(), 1..30),
        ) {
            let mut state = state(SessionType::Race);
            let mut outbox = Vec::new();

            for line in &lines {
                let before = state.race_state;
                let emitted_before = outbox.len();
                run(line, &mut state, &mut outbox);
                let after = state.race_state;

                // Red is only left through a restart
                if before == RaceState::Red {
                    prop_assert_eq!(after, RaceState::Red);
                }
                // Yellow sectors only exist while the track is yellow
                if after != RaceState::Yellow {
                    prop_assert!(state.yellow_flags.is_empty());
                }
                // A repeated red never emits
                if before == RaceState::Red && line == RED_FLAG {
                    prop_assert_eq!(outbox.len(), emitted_before);
                }
                // Safety car deployment overrides any yellow
                if line == SC_DEPLOYED && before != RaceState::Red {
                    prop_assert_eq!(after, RaceState::SafetyCar);
                }
            }
        }
    }
}
