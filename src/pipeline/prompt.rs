use crate::scoring::composite::{CompositeIndex, CompositeKind};
use crate::scoring::delta::DeltaRecord;
use crate::utils::utils::round_to;

pub const NO_CHANGES_LINE: &str = "- No numeric changes were detected.";

const INSTRUCTIONS: &str = "\
Guidelines:
- Discuss only the items listed above; do not mention anything that did not change.
- Always quote the concrete numbers (mm, degrees, percentages).
- Focus on the physical effects of beauty treatments such as massage, oils and face packs.
- Be professional but easy to understand, positive and encouraging.
- Keep it under 400 characters, use line breaks for readability and always finish the last sentence.";

/// Builds the commentary prompt from the changes that survive display rounding.
pub fn build_commentary_prompt(deltas: &[DeltaRecord], composites: &[CompositeIndex]) -> String {
    let mut prompt = String::from(
        "You are a counsellor specialising in beauty and aesthetic treatments.\n\
         Analyse the before/after changes below and describe the effect of the treatment.\n\n\
         Detected changes:\n",
    );

    let significant: Vec<&DeltaRecord> = deltas.iter().filter(|d| d.is_significant()).collect();
    if significant.is_empty() {
        prompt.push_str(NO_CHANGES_LINE);
        prompt.push('\n');
    } else {
        for delta in significant {
            prompt.push_str(&format!("- {}\n", describe_change(delta)));
        }
    }

    if !composites.is_empty() {
        prompt.push_str("\nSummary indices:\n");
        for composite in composites {
            prompt.push_str(&format!("- {}\n", describe_composite(composite)));
        }
    }

    prompt.push('\n');
    prompt.push_str(INSTRUCTIONS);
    prompt
}

fn describe_change(delta: &DeltaRecord) -> String {
    let decimals = delta.metric.display_decimals() as usize;
    let symbol = delta.unit.symbol();
    let direction = if delta.change > 0.0 { "increased" } else { "decreased" };
    let mut line = format!(
        "{}: {} by {:.*}{symbol} ({:.*}{symbol} -> {:.*}{symbol}",
        delta.metric.label(),
        direction,
        decimals,
        delta.change.abs(),
        decimals,
        delta.before,
        decimals,
        delta.after,
    );
    if let Some(percent) = delta.change_percent {
        line.push_str(&format!(", {percent:+.1}%"));
    }
    line.push(')');
    if delta.improved {
        line.push_str(", an improvement");
    }
    line
}

fn describe_composite(composite: &CompositeIndex) -> String {
    match composite.kind {
        CompositeKind::FaceLiftIndex => format!("Face-lift index: {:+.1}", round_to(composite.value, 1)),
        CompositeKind::OverallScore => format!("Overall score: {:.0}/100 (50 means unchanged)", composite.value),
        CompositeKind::FaceSlimIndex => match composite.trend {
            Some(trend) => format!("Face-slim index: {:+.1} ({trend})", round_to(composite.value, 1)),
            None => format!("Face-slim index: {:+.1}", round_to(composite.value, 1)),
        },
    }
}
