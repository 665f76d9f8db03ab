use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use controller::{BacktestReport, Notice, NoticeLevel};
use core_types::{PnlSummary, Strategy, StrategyStatus, User, View};
use rust_decimal::{Decimal, RoundingStrategy};

/// Formats an amount as dollars with thousands separators, e.g. `-$1,234.50`.
pub fn format_usd(amount: Decimal) -> String {
    let rounded = amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .abs();
    let text = format!("{rounded:.2}");
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

fn format_pct(value: Decimal) -> String {
    format!("{:.2}%", value.round_dp(2))
}

fn pnl_cell(amount: Decimal) -> Cell {
    let cell = Cell::new(format_usd(amount));
    if amount.is_sign_positive() && !amount.is_zero() {
        cell.fg(Color::Green)
    } else if amount.is_sign_negative() && !amount.is_zero() {
        cell.fg(Color::Red)
    } else {
        cell
    }
}

fn on_off(flag: bool) -> Cell {
    if flag {
        Cell::new("ON").fg(Color::Green)
    } else {
        Cell::new("OFF").fg(Color::Red)
    }
}

fn status_cell(status: StrategyStatus) -> Cell {
    let label = if status.is_listed() { status.as_str() } else { "idle" };
    match status {
        StrategyStatus::Running => Cell::new(label).fg(Color::Green),
        StrategyStatus::Error => Cell::new(label).fg(Color::Red),
        StrategyStatus::Stopped | StrategyStatus::Idle => Cell::new(label),
    }
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// The account panel, the P&L summary and the deployed strategies.
pub fn dashboard(user: &User) -> String {
    let summary = PnlSummary::from_strategies(&user.strategies);

    let mut account = table();
    account.set_header(vec!["Account", "Plan", "Credits", "Copilot", "Backtests", "Terminal", "Engine", "Binance", "Slots"]);
    account.add_row(vec![
        Cell::new(&user.email),
        Cell::new(user.plan),
        Cell::new(user.credits),
        Cell::new(user.copilot),
        Cell::new(user.backtest),
        on_off(user.terminal),
        on_off(user.engine),
        match &user.broker {
            Some(keys) if user.has_broker_credentials() => Cell::new(keys.masked_key()),
            _ => Cell::new("not connected").fg(Color::Yellow),
        },
        Cell::new(format!("{}/{}", user.running_count(), user.plan.max_active_deployments())),
    ]);

    let mut pnl = table();
    pnl.set_header(vec!["Total P&L", "Strategies perf."]);
    pnl.add_row(vec![pnl_cell(summary.total), pnl_cell(summary.running)]);

    let listed: Vec<&Strategy> = user.listed_strategies().collect();
    let strategies = if listed.is_empty() {
        "No deployed strategies yet.".to_string()
    } else {
        strategy_table(&listed).to_string()
    };

    format!("Welcome back, {}\n{account}\n{pnl}\n{strategies}", user.handle())
}

fn strategy_table(strategies: &[&Strategy]) -> Table {
    let mut table = table();
    table.set_header(vec!["Id", "Name", "Symbol", "TF", "Mode", "Amount", "Lev.", "Status", "Live P&L", "Paper P&L", "LLM", "Last error"]);
    for s in strategies {
        table.add_row(vec![
            Cell::new(&s.id),
            Cell::new(s.display_name()),
            Cell::new(&s.symbol),
            Cell::new(&s.timeframe),
            Cell::new(s.mode.map(|m| m.as_str()).unwrap_or("-")),
            Cell::new(format_usd(s.amount)),
            Cell::new(format!("{}x", s.leverage.normalize())),
            status_cell(s.status),
            pnl_cell(s.live_pnl),
            pnl_cell(s.paper_pnl),
            Cell::new(s.llm.as_deref().unwrap_or("-")),
            Cell::new(s.last_error.as_deref().unwrap_or("")),
        ]);
    }
    table
}

/// Every strategy on the account, deployed or not.
pub fn strategies(user: &User) -> String {
    if user.strategies.is_empty() {
        return "No strategies yet. Create one with `richacle strategy create`.".to_string();
    }
    let all: Vec<&Strategy> = user.strategies.iter().collect();
    strategy_table(&all).to_string()
}

pub fn backtest(report: &BacktestReport) -> String {
    let mut out = format!("Backtest of {} ({})\n", report.strategy_name, report.strategy_id);

    if let Some(info) = &report.data_info {
        out.push_str(&format!("{} candles over {} years\n", info.candles, info.years.normalize()));
    }

    if let Some(m) = &report.metrics {
        let mut metrics = table();
        metrics.set_header(vec!["Total P&L", "Return", "Max drawdown", "Trades", "Wins", "Losses", "Win rate"]);
        metrics.add_row(vec![
            pnl_cell(m.total_pnl),
            Cell::new(format_pct(m.return_percent)),
            Cell::new(format_pct(m.max_drawdown)),
            Cell::new(m.total_trades),
            Cell::new(m.wins),
            Cell::new(m.losses),
            Cell::new(format_pct(m.win_rate_percent)),
        ]);
        out.push_str(&format!("{metrics}\n"));
    }

    let mut curve = table();
    curve.set_header(vec!["Trade", "P&L", "Equity"]);
    curve.add_row(vec![Cell::new("start"), Cell::new(""), pnl_cell(Decimal::ZERO)]);
    for (i, (trade, equity)) in report
        .trade_history
        .iter()
        .zip(report.equity_curve.iter().skip(1))
        .enumerate()
    {
        curve.add_row(vec![Cell::new(i + 1), pnl_cell(*trade), pnl_cell(*equity)]);
    }
    out.push_str(&curve.to_string());
    out
}

pub fn users(users: &[&User]) -> String {
    let mut table = table();
    table.set_header(vec!["Id", "Email", "Plan", "Credits", "Copilot", "Backtests", "Terminal", "Engine", "Strategies", "Running"]);
    for u in users {
        table.add_row(vec![
            Cell::new(&u.id),
            Cell::new(&u.email),
            Cell::new(u.plan),
            Cell::new(u.credits),
            Cell::new(u.copilot),
            Cell::new(u.backtest),
            on_off(u.terminal),
            on_off(u.engine),
            Cell::new(u.strategies.len()),
            Cell::new(u.running_count()),
        ]);
    }
    format!("{table}\n{} user(s)", users.len())
}

/// What to run next to reach `view` from the console.
fn hint(view: View) -> &'static str {
    match view {
        View::Login => "Sign in with `richacle login`.",
        View::Dashboard => "Check the terminal, engine and Binance keys with `richacle dashboard`.",
        View::Pricing => "Upgrade your plan on the pricing page.",
        View::Strategy => "See your strategies with `richacle strategy list`.",
        View::Backtest => "Run a backtest with `richacle backtest <id>`.",
        View::Admin => "List users with `richacle admin users`.",
        View::Landing | View::Signup | View::Terms | View::Policy => "",
    }
}

pub fn print_notice(notice: &Notice) {
    notice.log();
    match notice.level {
        NoticeLevel::Error => eprintln!("✗ {}", notice.message),
        NoticeLevel::Success => println!("✓ {}", notice.message),
        NoticeLevel::Info => println!("{}", notice.message),
    }
    if let Some(view) = notice.redirect {
        let hint = hint(view);
        if !hint.is_empty() {
            eprintln!("  → {hint}");
        }
    }
}
