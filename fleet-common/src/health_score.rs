use crate::twin::{DigitalTwinState, HealthState};

/// Transient scoring output. The score and classification are copied onto the
/// twin before persisting; the reasons are for operators and tests only.
#[derive(Clone, Debug, PartialEq)]
pub struct HealthScoreResult {
    pub score: i32,
    pub state: HealthState,
    pub reasons: Vec<&'static str>,
}

struct Rule {
    penalty: i32,
    reason: &'static str,
    applies: fn(&DigitalTwinState) -> bool,
}

/// Ordered penalty table. Predicates are mutually independent and all of them
/// are evaluated on every call; an unknown measurement triggers nothing.
const RULES: &[Rule] = &[
    Rule {
        penalty: 60,
        reason: "critically low battery",
        applies: |twin| twin.telemetry.battery_soc_pct.is_some_and(|soc| soc < 15.0),
    },
    Rule {
        penalty: 30,
        reason: "battery below optimal",
        applies: |twin| {
            twin.telemetry
                .battery_soc_pct
                .is_some_and(|soc| (15.0..30.0).contains(&soc))
        },
    },
    Rule {
        penalty: 60,
        reason: "critically high battery temperature",
        applies: |twin| twin.telemetry.battery_temp_c.is_some_and(|temp| temp > 55.0),
    },
    Rule {
        penalty: 30,
        reason: "battery temperature above normal",
        applies: |twin| {
            twin.telemetry
                .battery_temp_c
                .is_some_and(|temp| temp > 45.0 && temp <= 55.0)
        },
    },
    Rule {
        penalty: 60,
        reason: "vehicle offline",
        applies: |twin| !twin.online,
    },
];

/// Pure and deterministic given the twin's telemetry snapshot and online
/// flag: start at 100, fold the penalty table, clamp at 0.
pub fn evaluate(twin: &DigitalTwinState) -> HealthScoreResult {
    let (score, reasons) =
        RULES
            .iter()
            .fold((100, Vec::new()), |(score, mut reasons), rule| {
                if (rule.applies)(twin) {
                    reasons.push(rule.reason);
                    (score - rule.penalty, reasons)
                } else {
                    (score, reasons)
                }
            });

    let score = score.max(0);
    HealthScoreResult {
        score,
        state: HealthState::from_score(score),
        reasons,
    }
}
