use anyhow::Result;
use clap::Parser;
use exchange::{ExchangeApi, Instrument, OrderType, Side};
use exchange_client::args::ConnectionArgs;
use exchange_client::testkit::{position, MockExchange, MockSettings};
use exchange_client::{logging, Exchange};
use log::info;
use std::thread;
use std::time::Duration;

/// Connects to the exchange, shows what it knows and trades a little.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct DemoArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Run against an in-process mock exchange instead of a real one
    #[arg(long)]
    mock: bool,

    #[arg(long, default_value = "ASML")]
    instrument: String,

    #[arg(long, default_value_t = 100.0)]
    price: f64,

    #[arg(long, default_value_t = 5)]
    volume: i64,

    #[arg(long, default_value = "bid")]
    side: Side,
}

fn main() -> Result<()> {
    let args = DemoArgs::parse();
    logging::init(args.connection.log_level());

    let mut config = args.connection.client_config()?;
    let mock = if args.mock {
        let mock = MockExchange::with_settings(MockSettings {
            username: args.connection.username().to_string(),
            password: args.connection.password().to_string(),
            positions: vec![position(args.instrument.clone(), 0, 0.0)],
            instruments: vec![Instrument::new(args.instrument.clone(), 0.01)],
            ..MockSettings::default()
        })?;
        config.host = "127.0.0.1".to_string();
        config.info_port = mock.info_port();
        config.exec_port = mock.exec_port();
        info!("Started mock exchange on ports {} / {}", mock.info_port(), mock.exec_port());
        Some(mock)
    } else {
        None
    };

    let exchange = Exchange::new(config);
    exchange.connect(
        args.connection.username(),
        args.connection.password(),
        args.connection.admin_password(),
    )?;

    // Give the information channel a moment to deliver the instrument list.
    thread::sleep(Duration::from_millis(200));
    for (id, instrument) in exchange.get_instruments()? {
        println!("instrument {:<12} tick {:<6} paused {}", id, instrument.tick_size, instrument.paused);
    }

    let order_id = exchange.insert_order(&args.instrument, args.price, args.volume, args.side, OrderType::Limit)?;
    println!("inserted order {} ({} {}@{})", order_id, args.side, args.volume, args.price);

    if let Some(mock) = &mock {
        mock.fill(order_id, args.volume)?;
        mock.trade_tick(&args.instrument, args.price + 1.0, 1)?;
        thread::sleep(Duration::from_millis(200));
    }

    println!("outstanding: {:?}", exchange.get_outstanding_orders(&args.instrument)?);
    for trade in exchange.poll_new_trades(&args.instrument)? {
        println!("trade: {} {}@{}", trade.side, trade.volume, trade.price);
    }
    for (id, entry) in exchange.get_positions_and_cash()? {
        println!("position {:<12} volume {:>6} cash {:>12.2}", id, entry.volume, entry.cash);
    }
    match exchange.get_pnl(None) {
        Ok(pnl) => println!("pnl: {:.2}", pnl),
        Err(e) => println!("pnl unavailable: {}", e),
    }

    exchange.delete_orders(&args.instrument)?;
    exchange.disconnect()?;
    Ok(())
}
