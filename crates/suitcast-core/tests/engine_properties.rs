use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use suitcast_core::history::HistoryBuffer;
use suitcast_core::learner::CorrelationLearner;
use suitcast_core::predict::SchedulerState;
use suitcast_core::verify::Feedback;
use suitcast_core::{
    AdminNotice, Card, Deck, Engine, EngineConfig, EngineSnapshot, GameEvent, LearningCause,
    ManualRule, Outbound, PredictionStatus, Regime, RuleError, Suit, Tier,
};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap() + TimeDelta::seconds(secs)
}

fn card(text: &str) -> Card {
    text.parse().expect("valid card")
}

fn event(game: u64, cards: &[&str]) -> GameEvent {
    GameEvent::new(game, cards.iter().map(|c| card(c)).collect())
}

fn engine() -> Engine {
    Engine::new(EngineConfig::default()).expect("default config is valid")
}

fn manual_batch(hearts_trigger: &str) -> Vec<ManualRule> {
    vec![
        ManualRule::new(card(hearts_trigger), Suit::Hearts, 3),
        ManualRule::new(card("K♦"), Suit::Hearts, 1),
        ManualRule::new(card("K♠"), Suit::Spades, 1),
        ManualRule::new(card("Q♠"), Suit::Spades, 1),
        ManualRule::new(card("Q♦"), Suit::Diamonds, 1),
        ManualRule::new(card("J♦"), Suit::Diamonds, 1),
        ManualRule::new(card("Q♣"), Suit::Clubs, 1),
        ManualRule::new(card("J♣"), Suit::Clubs, 1),
    ]
}

#[test]
fn predictions_target_two_games_ahead_and_never_repeat() {
    let mut engine = engine();
    let mut created = Vec::new();
    for game in 1..=200u64 {
        let mut deck = Deck::shuffled_with_seed(game * 7919);
        let mut fresh = GameEvent::new(game, deck.draw(3));
        let secs = game as i64 * 60;
        if let Some(prediction) = engine.process(&fresh, at(secs)).prediction {
            assert_eq!(prediction.target_game, prediction.source_game + 2);
            created.push(prediction.target_game);
        }
        fresh.delivery = suitcast_core::Delivery::Edited;
        assert!(engine.process(&fresh, at(secs + 1)).prediction.is_none());
    }

    assert!(!created.is_empty());
    assert!(created.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(created.len(), engine.ledger().len());
    for prediction in engine.ledger().iter() {
        assert_eq!(prediction.target_game, prediction.source_game + 2);
    }
}

#[test]
fn spacing_between_predictions_is_respected() {
    let mut engine = engine();
    let mut sources = Vec::new();
    for game in 1..=30u64 {
        let report = engine.process(&event(game, &["10♦", "2♣", "3♣"]), at(game as i64 * 60));
        if let Some(prediction) = report.prediction {
            sources.push(prediction.source_game);
        }
    }
    assert!(sources.windows(2).all(|pair| pair[1] - pair[0] >= 3));
}

#[test]
fn resolution_happens_once_even_on_redelivery() {
    let mut engine = engine();
    engine.process(&event(10, &["10♦", "2♣", "3♣"]), at(0));
    let won = engine.process(&event(12, &["2♠", "3♣", "4♣"]), at(60));
    assert_eq!(won.verification.map(|v| v.target_game), Some(12));

    let replay = engine.process(&event(12, &["2♥", "3♥", "4♥"]).edited(), at(120));
    assert!(replay.verification.is_none());
    assert_eq!(
        engine.ledger().get(12).map(|p| p.status),
        Some(PredictionStatus::Won { offset: 0 })
    );
}

#[test]
fn wins_inside_window_record_their_offset() {
    let mut engine = engine();
    engine.process(&event(10, &["10♦", "2♣", "3♣"]), at(0));
    assert!(engine.process(&event(12, &["2♥"]), at(60)).verification.is_none());
    let report = engine.process(&event(13, &["3♥", "4♠", "5♣"]), at(120));

    assert_eq!(
        engine.ledger().get(12).map(|p| p.status),
        Some(PredictionStatus::Won { offset: 1 })
    );
    let edited: Vec<_> = report
        .outbound
        .iter()
        .filter_map(|item| match item {
            Outbound::Edit { request, .. } => Some(request.text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(edited, vec!["🔵12🔵:♠️ statut :✅1️⃣"]);
}

#[test]
fn misses_lose_at_offset_two_or_on_a_final_result() {
    let mut engine = engine();
    engine.process(&event(10, &["10♦", "2♣", "3♣"]), at(0));
    engine.process(&event(12, &["2♥"]), at(60));
    engine.process(&event(13, &["2♥", "3♥"]), at(120));
    assert!(engine.ledger().get(12).unwrap().status.is_pending());
    engine.process(&event(14, &["2♥"]), at(180));
    assert_eq!(engine.ledger().get(12).unwrap().status, PredictionStatus::Lost);

    let mut engine = self::engine();
    engine.process(&event(10, &["10♦", "2♣", "3♣"]), at(0));
    engine.process(&event(12, &["2♥", "3♥", "4♦"]), at(60));
    assert_eq!(engine.ledger().get(12).unwrap().status, PredictionStatus::Lost);
}

#[test]
fn a_single_inter_loss_disables_inter() {
    let mut engine = engine();
    engine.submit_manual_rules(&manual_batch("10♦")).unwrap();
    assert!(engine.inter_active());

    let report = engine.process(&event(10, &["10♦", "2♣", "3♣"]), at(0));
    let prediction = report.prediction.unwrap();
    assert_eq!(prediction.tier, Tier::Manual);
    assert_eq!(prediction.predicted_suit, Suit::Hearts);

    let report = engine.process(&event(12, &["2♣", "3♣", "4♣"]), at(60));
    assert!(matches!(
        report.feedback,
        Some(Feedback::InterLoss {
            transition: Some(_)
        })
    ));
    assert!(!engine.inter_active());
    assert_eq!(engine.status().regime, Regime::Static);
}

#[test]
fn two_static_losses_force_inter_and_a_rebuild() {
    let mut engine = engine();
    engine.process(&event(10, &["10♦", "2♣", "3♣"]), at(0));
    let second = engine.process(&event(13, &["10♦", "2♥", "3♥"]), at(60));
    assert_eq!(second.prediction.map(|p| p.target_game), Some(15));
    assert_eq!(engine.mode().static_failures(), 1);

    let report = engine.process(&event(15, &["2♥", "3♥", "4♦"]), at(120));
    assert_eq!(report.feedback, Some(Feedback::StaticStreakExhausted));
    let learning = report.learning.unwrap();
    assert_eq!(learning.cause, LearningCause::StaticFailures);
    assert!(learning.transition.is_some());
    assert!(engine.inter_active());
    assert_eq!(engine.mode().static_failures(), 0);
    assert_eq!(engine.rules().learned_rules().len(), 1);

    let next = engine.process(&event(18, &["10♦", "2♣", "3♣"]), at(180));
    let prediction = next.prediction.unwrap();
    assert_eq!(prediction.tier, Tier::Learned);
    assert_eq!(prediction.predicted_suit, Suit::Hearts);
}

#[test]
fn forced_rebuild_without_samples_still_activates_inter() {
    let mut engine = engine();
    engine.process(&event(10, &["10♦", "2♣", "3♣"]), at(0));
    let report = engine.process(&event(14, &["10♦", "2♥"]), at(60));
    assert_eq!(report.prediction.map(|p| p.target_game), Some(16));
    assert_eq!(engine.mode().static_failures(), 1);

    let report = engine.process(&event(18, &["2♥"]), at(120));
    assert_eq!(report.feedback, Some(Feedback::StaticStreakExhausted));
    assert!(engine.learner().is_empty());
    assert!(!report.learning.unwrap().replaced);
    assert!(engine.inter_active());
    assert!(engine.rules().learned_rules().is_empty());
}

#[test]
fn rebuild_keeps_the_two_strongest_triggers_per_suit() {
    let mut history = HistoryBuffer::new(100);
    let mut learner = CorrelationLearner::new(100);
    let mut game = 0;
    for (trigger, times) in [("J♦", 5), ("Q♦", 3), ("K♦", 1)] {
        for _ in 0..times {
            game += 3;
            history.record(game, card(trigger));
            learner.observe(&history, &event(game + 2, &["4♠", "2♣", "3♣"]));
        }
    }
    assert_eq!(learner.len(), 9);

    let table = learner.rebuild(2, |_, _| false);
    let spades: Vec<_> = table
        .get(Suit::Spades)
        .iter()
        .map(|entry| (entry.trigger, entry.count))
        .collect();
    assert_eq!(spades, vec![(card("J♦"), 5), (card("Q♦"), 3)]);
    assert!(table.get(Suit::Hearts).is_empty());
}

#[test]
fn manual_merge_keeps_two_rules_per_suit() {
    let mut engine = engine();
    let first = engine.submit_manual_rules(&manual_batch("10♦")).unwrap();
    assert_eq!(first.added, 8);

    let mut second = manual_batch("10♦");
    second[1] = ManualRule::new(card("A♥"), Suit::Hearts, 5);
    let report = engine.submit_manual_rules(&second).unwrap();
    assert_eq!(report.merged, 7);
    assert_eq!(report.replaced, 1);

    let rules = engine.rules().manual_rules();
    for suit in Suit::ALL {
        assert_eq!(rules.iter().filter(|r| r.predict_suit == suit).count(), 2);
    }
    let ten = rules.iter().find(|r| r.trigger == card("10♦")).unwrap();
    assert_eq!(ten.weight, 6);
    assert!(rules.iter().any(|r| r.trigger == card("A♥")));
    assert!(!rules.iter().any(|r| r.trigger == card("K♦")));

    let restored = EngineSnapshot::capture(&engine)
        .restore(EngineConfig::default())
        .unwrap();
    assert_eq!(restored.rules().manual_rules(), rules);
}

#[test]
fn invalid_manual_batches_change_nothing() {
    let mut engine = engine();
    let batch = manual_batch("10♦");
    assert_eq!(
        engine.submit_manual_rules(&batch[..7]),
        Err(RuleError::BatchSize { found: 7 })
    );
    assert!(engine.rules().manual_rules().is_empty());
    assert!(!engine.inter_active());
}

fn stocked_engine() -> Engine {
    let mut engine = engine();
    engine.submit_manual_rules(&manual_batch("10♦")).unwrap();
    engine.process(&event(10, &["9♣", "2♣", "3♣"]), at(0));
    engine.process(&event(11, &["8♣", "2♣", "3♣"]), at(60));
    engine.process(&event(12, &["5♥", "2♣", "3♣"]), at(120));
    engine.force_learning(at(180));
    engine
}

#[test]
fn daily_reset_clears_stock_but_keeps_rules() {
    let mut engine = stocked_engine();
    let learned = engine.rules().learned_rules().to_vec();
    assert!(!learned.is_empty());
    assert!(!engine.ledger().is_empty());

    // 00:30 UTC is 01:30 at +01:00, past the 00:59 reset time.
    let next_day = Utc.with_ymd_and_hms(2024, 3, 11, 0, 30, 0).unwrap();
    let report = engine.process(&event(500, &["10♦", "2♣", "3♣"]), next_day);

    assert_eq!(report.reset, NaiveDate::from_ymd_opt(2024, 3, 11));
    assert!(report.outbound.iter().any(|item| matches!(
        item,
        Outbound::Admin(AdminNotice::DailyReset { .. })
    )));
    assert_eq!(engine.ledger().len(), 1);
    assert_eq!(report.prediction.map(|p| p.target_game), Some(502));
    assert_eq!(engine.history().len(), 1);
    assert!(engine.learner().is_empty());
    assert_eq!(engine.rules().manual_rules().len(), 8);
    assert_eq!(engine.rules().learned_rules(), learned.as_slice());

    let later = engine.process(&event(503, &["2♣"]), next_day + TimeDelta::hours(3));
    assert!(later.reset.is_none());
}

#[test]
fn daily_reset_fires_at_exactly_the_local_reset_minute() {
    let mut engine = stocked_engine();
    let learned = engine.rules().learned_rules().to_vec();
    assert!(!learned.is_empty());
    assert!(!engine.ledger().is_empty());
    assert!(!engine.history().is_empty());

    // 23:59 UTC on the 10th is 00:59 on the 11th at +01:00.
    let reset_minute = Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 0).unwrap();
    let report = engine.process(&GameEvent::new(600, Vec::new()), reset_minute);

    assert_eq!(report.reset, NaiveDate::from_ymd_opt(2024, 3, 11));
    assert!(report.outbound.iter().any(|item| matches!(
        item,
        Outbound::Admin(AdminNotice::DailyReset { cleared_predictions, .. }) if *cleared_predictions > 0
    )));
    assert!(engine.ledger().is_empty());
    assert_eq!(engine.ledger().last_predicted_game(), 0);
    assert!(engine.history().is_empty());
    assert!(engine.learner().is_empty());

    let snapshot = EngineSnapshot::capture(&engine);
    assert!(snapshot.processed_games.is_empty());
    assert_eq!(snapshot.scheduler, SchedulerState::default());
    assert_eq!(engine.rules().manual_rules().len(), 8);
    assert_eq!(engine.rules().learned_rules(), learned.as_slice());

    // Low game numbers are schedulable again once the watermark is gone.
    let fresh = engine.process(&event(4, &["10♦", "2♣", "3♣"]), reset_minute);
    assert_eq!(fresh.prediction.map(|p| p.target_game), Some(6));
}

#[test]
fn no_daily_reset_one_minute_before_the_reset_time() {
    let mut engine = stocked_engine();
    let ledger_len = engine.ledger().len();
    let history_len = engine.history().len();

    let minute_before = Utc.with_ymd_and_hms(2024, 3, 10, 23, 58, 0).unwrap();
    let report = engine.process(&GameEvent::new(600, Vec::new()), minute_before);

    assert!(report.reset.is_none());
    assert!(report.outbound.is_empty());
    assert_eq!(engine.ledger().len(), ledger_len);
    assert_eq!(engine.history().len(), history_len);
    assert!(!EngineSnapshot::capture(&engine).processed_games.is_empty());
}

#[test]
fn first_event_adopts_the_day_without_resetting() {
    let mut engine = engine();
    let report = engine.process(&event(10, &["10♦", "2♣", "3♣"]), at(0));

    assert!(report.reset.is_none());
    assert!(report.outbound.iter().all(|item| !matches!(
        item,
        Outbound::Admin(AdminNotice::DailyReset { .. })
    )));
    assert_eq!(engine.ledger().len(), 1);
    assert_eq!(
        EngineSnapshot::capture(&engine).reset.last_reset_date,
        NaiveDate::from_ymd_opt(2024, 3, 10)
    );
}
