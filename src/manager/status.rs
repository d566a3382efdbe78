use super::ManagerCtx;
use crate::interval::Loop;
use colored::Colorize;
use prettytable::{Cell, Row, Table};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const REFRESH: Duration = Duration::from_millis(50);

/// Status display worker: repaints the whole car park state on stdout
/// every 50 ms. Plates, gates and signs are read under their mutexes;
/// temperatures and alarms are atomic so they are read bare.
pub(super) fn run(ctx: &Arc<ManagerCtx>) {
    let mut tick = Loop::prepare(REFRESH);
    while !ctx.end.is_raised() {
        let frame = render(ctx);
        let mut stdout = std::io::stdout();
        // clear the terminal and repaint from the top-left corner
        let _ = write!(stdout, "\x1b[2J\x1b[H{}", frame);
        let _ = stdout.flush();
        tick.tick();
    }
}

fn ctable(titles: &[&str]) -> Table {
    let mut table = Table::new();
    let format = prettytable::format::FormatBuilder::new()
        .column_separator(' ')
        .borders(' ')
        .separators(
            &[prettytable::format::LinePosition::Title],
            prettytable::format::LineSeparator::new('-', '-', '-', '-'),
        )
        .padding(0, 1)
        .build();
    table.set_format(format);
    let titlevec: Vec<Cell> = titles
        .iter()
        .map(|t| Cell::new(&t.blue().to_string()))
        .collect();
    table.set_titles(Row::new(titlevec));
    table
}

fn render(ctx: &ManagerCtx) -> String {
    let counts = ctx.region.counts();
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", "== CAR PARK STATUS ==".bold()));

    let mut entrances = ctable(&["ENTRANCE", "LPR", "GATE", "SIGN"]);
    for i in 0..counts.entrances {
        let en = ctx.region.entrance(i);
        let plate = en
            .lpr
            .lock()
            .plate()
            .map_or_else(|| "------".to_owned(), |p| p.to_string());
        let gate = en.gate.lock().status().as_char().to_string();
        let sign = en.sign.lock().display().as_char().to_string();
        let _ = entrances.add_row(Row::new(vec![
            Cell::new(&format!("#{}", i + 1)),
            Cell::new(&plate),
            Cell::new(&gate),
            Cell::new(&sign),
        ]));
    }
    out.push_str(&entrances.to_string());
    out.push('\n');

    let mut exits = ctable(&["EXIT", "LPR", "GATE"]);
    for i in 0..counts.exits {
        let ex = ctx.region.exit(i);
        let plate = ex
            .lpr
            .lock()
            .plate()
            .map_or_else(|| "------".to_owned(), |p| p.to_string());
        let gate = ex.gate.lock().status().as_char().to_string();
        let _ = exits.add_row(Row::new(vec![
            Cell::new(&format!("#{}", i + 1)),
            Cell::new(&plate),
            Cell::new(&gate),
        ]));
    }
    out.push_str(&exits.to_string());
    out.push('\n');

    let occupancy = ctx.occupancy.snapshot();
    let mut levels = ctable(&["LEVEL", "LPR", "TEMP", "ALARM", "CAPACITY"]);
    for i in 0..counts.levels {
        let level = ctx.region.level(i);
        let plate = level
            .lpr
            .lock()
            .plate()
            .map_or_else(|| "------".to_owned(), |p| p.to_string());
        let alarm = if level.alarm_raised() {
            "FIRE".red().bold().to_string()
        } else {
            "-".to_owned()
        };
        let _ = levels.add_row(Row::new(vec![
            Cell::new(&format!("#{}", i + 1)),
            Cell::new(&plate),
            Cell::new(&format!("{}\u{b0}", level.temperature())),
            Cell::new(&alarm),
            Cell::new(&format!(
                "{}/{}",
                occupancy.get(i).copied().unwrap_or(0),
                ctx.config.capacity
            )),
        ]));
    }
    out.push_str(&levels.to_string());

    let total: u32 = occupancy.iter().sum();
    let revenue = ctx.billing.revenue_cents();
    out.push_str(&format!(
        "\n TOTAL CAPACITY: {}/{} parked\nTOTAL CUSTOMERS: {} cars\n  TOTAL REVENUE: {}\n",
        total,
        ctx.config.total_capacity(),
        ctx.billing.total_entered(),
        format!("${}.{:02}", revenue / 100, revenue % 100).green()
    ));
    out
}
