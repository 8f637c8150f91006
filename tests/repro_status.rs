use chrono::NaiveDate;
use serde_json::json;

use smartcow_sync::{
    record::RecordDraft,
    repro::{
        date::parse_br_date,
        event::{EventType, ReproEvent},
        status::{
            ProductiveStatus, ReproSettings, ReproductiveStatus, current_cycle, days_in_milk,
            derive_status, last_insemination, pregnancy_confirmed, productive_status, reproductive_status,
        },
    },
};

const COW: &str = "vaca-0421";

fn date(s: &str) -> NaiveDate {
    parse_br_date(s).expect("valid date")
}

fn ev(kind: EventType, when: &str) -> ReproEvent {
    ReproEvent::new(COW, kind, date(when))
}

fn dg(when: &str, pregnant: bool) -> ReproEvent {
    ev(EventType::Dg, when).with_meta(json!({ "prenhe": pregnant }))
}

#[test]
fn heifer_without_events() {
    let today = date("01/06/2024");
    let summary = derive_status(&[], today, &ReproSettings::default());
    assert_eq!(summary.productive, ProductiveStatus::Heifer);
    assert_eq!(summary.reproductive, ReproductiveStatus::Open);
    assert_eq!(summary.days_in_milk, None);
    assert_eq!(summary.last_calving, None);
}

#[test]
fn days_in_milk_counts_from_last_calving() {
    let events = vec![ev(EventType::Parto, "01/01/2023"), ev(EventType::Parto, "01/03/2024")];
    assert_eq!(days_in_milk(&events, date("31/03/2024")), Some(30));
    assert_eq!(productive_status(&events), ProductiveStatus::Lactating);
}

#[test]
fn dry_off_after_calving_clears_days_in_milk() {
    let events = vec![ev(EventType::Parto, "01/01/2024"), ev(EventType::Secagem, "2024-10-01")];
    assert_eq!(days_in_milk(&events, date("15/10/2024")), None);
    assert_eq!(productive_status(&events), ProductiveStatus::Dry);
}

#[test]
fn dry_off_from_previous_lactation_is_ignored() {
    let events = vec![
        ev(EventType::Parto, "01/01/2023"),
        ev(EventType::Secagem, "01/10/2023"),
        ev(EventType::Parto, "05/01/2024"),
    ];
    assert_eq!(days_in_milk(&events, date("15/01/2024")), Some(10));
    assert_eq!(productive_status(&events), ProductiveStatus::Lactating);
}

#[test]
fn calving_in_the_future_clamps_to_zero() {
    let events = vec![ev(EventType::Parto, "10/03/2024")];
    assert_eq!(days_in_milk(&events, date("01/03/2024")), Some(0));
}

#[test]
fn insemination_before_calving_belongs_to_previous_cycle() {
    let events = vec![ev(EventType::Ia, "01/04/2023"), ev(EventType::Parto, "01/01/2024")];
    let today = date("10/01/2024");

    assert_eq!(last_insemination(&events), None);
    assert!(current_cycle(&events).is_empty());
    assert_eq!(
        reproductive_status(&events, today, &ReproSettings::default()),
        ReproductiveStatus::PostPartum
    );
}

#[test]
fn events_on_the_calving_date_are_outside_the_cycle() {
    let events = vec![ev(EventType::Parto, "01/01/2024"), ev(EventType::Ia, "01/01/2024")];
    assert_eq!(last_insemination(&events), None);
}

#[test]
fn voluntary_waiting_period_boundary() {
    let events = vec![ev(EventType::Parto, "01/01/2024")];
    let settings = ReproSettings::default();
    assert_eq!(
        reproductive_status(&events, date("14/02/2024"), &settings),
        ReproductiveStatus::PostPartum
    );
    assert_eq!(
        reproductive_status(&events, date("15/02/2024"), &settings),
        ReproductiveStatus::Open
    );

    let longer = ReproSettings {
        voluntary_waiting_days: 60,
    };
    assert_eq!(
        reproductive_status(&events, date("15/02/2024"), &longer),
        ReproductiveStatus::PostPartum
    );
}

#[test]
fn diagnosis_decides_after_insemination() {
    let base = vec![ev(EventType::Parto, "01/01/2024"), ev(EventType::Ia, "01/03/2024")];
    let today = date("15/04/2024");
    let settings = ReproSettings::default();

    assert_eq!(reproductive_status(&base, today, &settings), ReproductiveStatus::Inseminated);
    assert!(!pregnancy_confirmed(&base));

    let mut positive = base.clone();
    positive.push(dg("05/04/2024", true));
    assert_eq!(reproductive_status(&positive, today, &settings), ReproductiveStatus::Inseminated);
    assert!(pregnancy_confirmed(&positive));

    let mut negative = base.clone();
    negative.push(dg("05/04/2024", false));
    assert_eq!(reproductive_status(&negative, today, &settings), ReproductiveStatus::Open);
    assert!(!pregnancy_confirmed(&negative));

    let mut aborted = positive.clone();
    aborted.push(ev(EventType::Aborto, "10/04/2024"));
    assert_eq!(reproductive_status(&aborted, today, &settings), ReproductiveStatus::Open);
    assert!(!pregnancy_confirmed(&aborted));
}

#[test]
fn diagnosis_text_results_are_understood() {
    let pos = ev(EventType::Dg, "01/05/2024").with_meta(json!({"resultado": "Positivo"}));
    let neg = ev(EventType::Dg, "01/05/2024").with_meta(json!({"resultado": "vazia"}));
    let unknown = ev(EventType::Dg, "01/05/2024");
    assert_eq!(pos.diagnosis_positive(), Some(true));
    assert_eq!(neg.diagnosis_positive(), Some(false));
    assert_eq!(unknown.diagnosis_positive(), None);
    assert_eq!(ev(EventType::Ia, "01/05/2024").diagnosis_positive(), None);
}

#[test]
fn never_calved_later_event_decides_productive_status() {
    let dried = vec![ev(EventType::Aborto, "01/02/2024"), ev(EventType::Secagem, "01/03/2024")];
    let aborted = vec![ev(EventType::Secagem, "01/02/2024"), ev(EventType::Aborto, "01/03/2024")];
    assert_eq!(productive_status(&dried), ProductiveStatus::Dry);
    assert_eq!(productive_status(&aborted), ProductiveStatus::NotLactating);
}

#[test]
fn summary_ignores_input_order() {
    let mut events = vec![
        ev(EventType::Parto, "01/01/2024"),
        ev(EventType::Ia, "20/02/2024"),
        ev(EventType::Ia, "12/03/2024"),
        dg("20/04/2024", true),
        ev(EventType::Parto, "01/01/2023"),
    ];
    let today = date("01/05/2024");
    let settings = ReproSettings::default();
    let forward = derive_status(&events, today, &settings);
    events.reverse();
    let backward = derive_status(&events, today, &settings);

    assert_eq!(forward, backward);
    assert_eq!(forward.last_insemination, Some(date("12/03/2024")));
    assert_eq!(forward.days_since_insemination, Some(50));
    assert_eq!(forward.days_in_milk, Some(121));
    assert!(forward.pregnancy_confirmed);
}

#[test]
fn events_load_from_cached_records() {
    let record = RecordDraft::from_value(json!({
        "fazenda_id": "fazenda-1",
        "animal_id": COW,
        "tipo": "parto",
        "data_evento": "09/03/2024",
    }))
    .into_record();
    let event = ReproEvent::from_record(&record).expect("decode");
    assert_eq!(event.event_type, EventType::Parto);
    assert_eq!(event.event_date, date("2024-03-09T08:30:00Z"));

    let bad = RecordDraft::from_value(json!({
        "animal_id": COW,
        "tipo": "IA",
        "data_evento": "31/02/2024",
    }))
    .into_record();
    assert!(ReproEvent::from_record(&bad).is_err());
}
