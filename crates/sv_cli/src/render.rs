//! Plain-text report built from the result artifact alone (no recompute).
//!
//! Per method: the winner of every country, the seat table sorted by seats
//! (ties keep registry order) and the government line.

use std::fmt::{self, Write};

use sv_pipeline::build_result::{MethodResultDoc, ResultDoc};

pub fn render_text(result: &ResultDoc) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let body = &result.body;
    let name_of = |id: &str| {
        body.channels
            .iter()
            .find(|c| c.id.as_str() == id)
            .map_or_else(|| id.to_string(), |c| c.name.clone())
    };

    writeln!(out, "Result {}", result.id)?;
    if let Some(s) = &body.scenario_id {
        writeln!(out, "Scenario {s}, seed {}", body.seed)?;
    } else {
        writeln!(out, "Seed {}", body.seed)?;
    }

    for m in &body.methods {
        writeln!(out)?;
        writeln!(out, "------------- {} -------------", m.method.as_str().to_ascii_uppercase())?;
        for w in &m.winners {
            match &w.winner {
                Some(ch) => writeln!(out, "Winner {}: {}", w.country, name_of(ch.as_str()))?,
                None => writeln!(out, "Winner {}: none", w.country)?,
            }
        }

        writeln!(out)?;
        writeln!(out, "Seats distribution for {} seats (countries):", m.winners.len())?;
        let width = body.channels.iter().map(|c| c.name.chars().count()).max().unwrap_or(0).max(9);
        for row in sorted_seats(m) {
            writeln!(out, "  {:<width$}  {:>3}", name_of(row.0), row.1)?;
        }
        if m.no_winner > 0 {
            writeln!(out, "  {:<width$}  {:>3}", "no winner", m.no_winner)?;
        }

        writeln!(out)?;
        match &m.government {
            Some(g) if m.government_tied => {
                writeln!(out, "{} forms government! (tied on seats, registry order)", name_of(g.as_str()))?
            }
            Some(g) => writeln!(out, "{} forms government!", name_of(g.as_str()))?,
            None => writeln!(out, "No channel forms government.")?,
        }
    }
    Ok(out)
}

/// (channel id, seats) by seats descending; stable, so ties keep registry order.
fn sorted_seats(m: &MethodResultDoc) -> Vec<(&str, u32)> {
    let mut rows: Vec<(&str, u32)> = m.seats.iter().map(|s| (s.channel.as_str(), s.seats)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    rows
}
