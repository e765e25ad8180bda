use anyhow::Result;
use exchange::{ExchangeApi, Instrument, OrderType, PositionEntry, Side};
use exchange_client::comms::messages::{InstrumentEvent, PriceBookUpdate, WirePriceLevel};
use exchange_client::comms::Message;
use exchange_client::testkit::{eventually, position, MockExchange, MockSettings};
use exchange_client::{ClientConfig, ClientError, Exchange};
use std::collections::HashMap;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn connect_with(config: ClientConfig) -> Result<Exchange> {
    let _ = env_logger::builder().is_test(true).try_init();
    let exchange = Exchange::new(config);
    exchange.connect("trader", "secret", None)?;
    Ok(exchange)
}

fn connect(mock: &MockExchange) -> Result<Exchange> {
    connect_with(mock.config())
}

#[test]
fn test_fill_updates_positions_and_cash() -> Result<()> {
    let mock = MockExchange::start()?;
    let exchange = connect(&mock)?;

    // 1. Rest a bid
    let order_id = exchange.insert_order("ASML", 100.0, 5, Side::Bid, OrderType::Limit)?;
    assert!(eventually(WAIT, || {
        exchange
            .get_outstanding_orders("ASML")
            .map(|orders| orders.contains_key(&order_id))
            .unwrap_or(false)
    }));

    // 2. Exchange fills it completely
    mock.fill(order_id, 5)?;
    assert!(eventually(WAIT, || {
        exchange.get_positions().ok().and_then(|p| p.get("ASML").copied()) == Some(5)
    }));

    // 3. Verify ledger, histories and order book of our own orders
    assert_eq!(
        exchange.get_positions_and_cash()?["ASML"],
        PositionEntry::new(5, -500.0)
    );
    assert_eq!(exchange.get_cash()?, -500.0);
    assert!(exchange.get_outstanding_orders("ASML")?.is_empty());

    let trades = exchange.poll_new_trades("ASML")?;
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].order_id, order_id);
    assert_eq!(trades[0].side, Side::Bid);
    assert!(exchange.poll_new_trades("ASML")?.is_empty());
    assert_eq!(exchange.get_trade_history("ASML")?.len(), 1);

    exchange.clear_trade_history()?;
    assert!(exchange.get_trade_history("ASML")?.is_empty());

    exchange.disconnect()?;
    Ok(())
}

#[test]
fn test_login_seeds_positions_and_pnl() -> Result<()> {
    let mock = MockExchange::with_settings(MockSettings {
        positions: vec![position("ASML", 3, -300.0), position("PHILIPS", 0, 25.0)],
        ..MockSettings::default()
    })?;
    let exchange = connect(&mock)?;

    assert_eq!(exchange.get_positions()?["ASML"], 3);
    assert_eq!(exchange.get_cash()?, -275.0);

    // No valuation and nothing traded yet
    assert_eq!(
        exchange.get_pnl(None),
        Err(ClientError::NoPnlAvailable {
            instrument_id: "ASML".into(),
            volume: 3
        })
    );

    let valuations = HashMap::from([("ASML".to_string(), 110.0)]);
    assert_eq!(exchange.get_pnl(Some(&valuations))?, -275.0 + 330.0);

    // A public trade provides the fallback price
    mock.trade_tick("ASML", 105.0, 1)?;
    assert!(eventually(WAIT, || {
        exchange.get_last_traded_price("ASML").ok().flatten() == Some(105.0)
    }));
    assert_eq!(exchange.get_pnl(None)?, -275.0 + 315.0);
    assert_eq!(exchange.get_trade_tick_history("ASML")?.len(), 1);

    Ok(())
}

#[test]
fn test_wrong_password_is_rejected() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mock = MockExchange::start()?;
    let exchange = Exchange::new(mock.config());

    let result = exchange.connect("trader", "wrong", None);
    assert!(matches!(result, Err(ClientError::Authentication(_))));
    assert!(!exchange.is_connected());
    assert_eq!(exchange.get_positions(), Err(ClientError::NotConnected));

    // The same client can try again
    exchange.connect("trader", "secret", None)?;
    assert!(exchange.is_connected());
    Ok(())
}

#[test]
fn test_second_connect_is_rejected() -> Result<()> {
    let mock = MockExchange::start()?;
    let exchange = connect(&mock)?;

    assert_eq!(
        exchange.connect("trader", "secret", None),
        Err(ClientError::AlreadyConnected)
    );
    assert!(exchange.is_connected());
    Ok(())
}

#[test]
fn test_unanswered_handshake_times_out() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    // Accepts connections (via the backlog) but never says anything.
    let silent = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = silent.local_addr()?.port();
    let mut config = ClientConfig::new("127.0.0.1", port, port);
    config.connect_timeout_ms = 300;

    let exchange = Exchange::new(config);
    assert!(matches!(
        exchange.connect("trader", "secret", None),
        Err(ClientError::ConnectionTimeout(_))
    ));
    assert!(!exchange.is_connected());
    Ok(())
}

#[test]
fn test_amend_and_delete_orders() -> Result<()> {
    let mock = MockExchange::start()?;
    let exchange = connect(&mock)?;

    let first = exchange.insert_order("ASML", 99.0, 10, Side::Bid, OrderType::Limit)?;
    let second = exchange.insert_order("ASML", 101.0, 4, Side::Ask, OrderType::Limit)?;
    assert_ne!(first, second);

    assert!(exchange.amend_order("ASML", first, 2)?);
    assert!(eventually(WAIT, || {
        exchange
            .get_outstanding_orders("ASML")
            .ok()
            .and_then(|orders| orders.get(&first).map(|o| o.volume))
            == Some(2)
    }));

    assert!(exchange.delete_order("ASML", first)?);
    assert!(!exchange.delete_order("ASML", first)?);
    assert!(!exchange.amend_order("ASML", first, 1)?);

    exchange.delete_orders("ASML")?;
    assert!(eventually(WAIT, || {
        exchange
            .get_outstanding_orders("ASML")
            .map(|orders| orders.is_empty())
            .unwrap_or(false)
    }));
    assert!(mock.outstanding_orders().is_empty());
    Ok(())
}

#[test]
fn test_empty_book_is_not_missing() -> Result<()> {
    let mock = MockExchange::start()?;
    let exchange = connect(&mock)?;

    assert_eq!(exchange.get_last_price_book("ASML")?, None);

    mock.push_info(Message::PriceBook(PriceBookUpdate {
        instrument_id: "ASML".into(),
        bids: vec![],
        asks: vec![],
    }))?;
    assert!(eventually(WAIT, || {
        matches!(exchange.get_last_price_book("ASML"), Ok(Some(_)))
    }));
    let book = exchange.get_last_price_book("ASML")?.unwrap();
    assert!(book.is_empty());
    assert_eq!(book.best_bid(), None);

    mock.push_info(Message::PriceBook(PriceBookUpdate {
        instrument_id: "ASML".into(),
        bids: vec![WirePriceLevel { price: 99.5, volume: 10 }],
        asks: vec![WirePriceLevel { price: 100.5, volume: 3 }],
    }))?;
    assert!(eventually(WAIT, || {
        exchange
            .get_last_price_book("ASML")
            .ok()
            .flatten()
            .map(|book| !book.is_empty())
            .unwrap_or(false)
    }));
    let book = exchange.get_last_price_book("ASML")?.unwrap();
    assert_eq!(book.best_bid().map(|l| l.price), Some(99.5));
    assert_eq!(book.best_ask().map(|l| l.volume), Some(3));
    Ok(())
}

#[test]
fn test_instrument_lifecycle() -> Result<()> {
    let option_json = r#"{"instrument_type":"OPTION","base_instrument_id":"ASML","expiry":"2030-01-01 00:00:00","option_kind":"CALL","strike":650.0}"#;
    let mock = MockExchange::with_settings(MockSettings {
        instruments: vec![
            Instrument::new("ASML", 0.01),
            Instrument::from_extra_info("ASML_C650", 0.05, None, option_json)?,
        ],
        ..MockSettings::default()
    })?;
    let exchange = connect(&mock)?;

    // 1. Announced instruments arrive after subscription
    assert!(eventually(WAIT, || {
        exchange.get_instruments().map(|i| i.len()).unwrap_or(0) == 2
    }));
    let instruments = exchange.get_instruments()?;
    assert!(instruments["ASML_C650"].is_option());
    assert_eq!(instruments["ASML_C650"].strike, Some(650.0));

    // 2. Pause and resume
    mock.push_info(Message::InstrumentPaused(InstrumentEvent::new("ASML")))?;
    assert!(eventually(WAIT, || {
        exchange
            .get_instruments()
            .map(|i| i["ASML"].paused)
            .unwrap_or(false)
    }));
    mock.push_info(Message::InstrumentResumed(InstrumentEvent::new("ASML")))?;
    assert!(eventually(WAIT, || {
        exchange
            .get_instruments()
            .map(|i| !i["ASML"].paused)
            .unwrap_or(false)
    }));

    // 3. Parameter update round trips through the exchange
    exchange.update_instrument_parameters("ASML", &serde_json::json!({"fair_value": 640.0}))?;
    assert!(eventually(WAIT, || {
        exchange
            .get_instruments()
            .map(|i| i["ASML"].parameters.is_some())
            .unwrap_or(false)
    }));

    // 4. Expiry moves the option out of the active set, reported once
    mock.push_info(Message::InstrumentExpired(InstrumentEvent::new("ASML_C650")))?;
    assert!(eventually(WAIT, || {
        exchange.get_instruments().map(|i| i.len()).unwrap_or(0) == 1
    }));
    let expired = exchange.poll_new_expired_instruments()?;
    assert!(expired.contains_key("ASML_C650"));
    assert!(exchange.poll_new_expired_instruments()?.is_empty());
    Ok(())
}

#[test]
fn test_trade_tick_history_is_bounded() -> Result<()> {
    let mock = MockExchange::start()?;
    let exchange = connect_with(mock.config().with_trade_history(3))?;

    for price in [100.0, 101.0, 102.0, 103.0, 104.0] {
        mock.trade_tick("ASML", price, 1)?;
    }
    assert!(eventually(WAIT, || {
        exchange.get_last_traded_price("ASML").ok().flatten() == Some(104.0)
    }));

    let prices: Vec<f64> = exchange
        .poll_new_trade_ticks("ASML")?
        .iter()
        .map(|t| t.price)
        .collect();
    assert_eq!(prices, vec![102.0, 103.0, 104.0]);
    assert!(exchange.poll_new_trade_ticks("ASML")?.is_empty());

    mock.trade_tick("ASML", 105.0, 1)?;
    assert!(eventually(WAIT, || {
        exchange.poll_new_trade_ticks_all().map(|all| all.len()).unwrap_or(0) == 1
    }));
    assert_eq!(exchange.get_trade_tick_history("ASML")?.len(), 3);

    exchange.clear_trade_tick_history()?;
    assert!(exchange.get_trade_tick_history("ASML")?.is_empty());
    Ok(())
}
