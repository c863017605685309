mod common;

use anyhow::Result;
use common::{parse_date, test_service};
use khata::application::{BusinessService, Change, EntityKind};
use khata::domain::SaleItem;

#[tokio::test]
async fn test_record_sale_totals_items() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let mut changes = service.changes().subscribe();

    let sale = service
        .record_sale(
            vec![SaleItem::new("  Rice 5kg ", 2, 45000), SaleItem::new("Soap", 3, 3500)],
            82000,
            parse_date("2024-03-15"),
        )
        .await?;
    assert_eq!(sale.amount, 100500);
    assert_eq!(sale.profit(), 18500);
    assert_eq!(sale.items[0].name, "Rice 5kg");

    let change = changes.try_recv()?;
    assert_eq!(change, Change::scoped(EntityKind::Sales, service.owner_id(), sale.id));

    let stored = service
        .list_sales(parse_date("2024-03-15"), parse_date("2024-03-15"))
        .await?;
    assert_eq!(stored, vec![sale]);
    Ok(())
}

#[tokio::test]
async fn test_invalid_sales_write_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let day = parse_date("2024-03-15");

    let rejected = [
        (vec![], 0),
        (vec![SaleItem::new(" ", 1, 1000)], 0),
        (vec![SaleItem::new("Dal", 0, 1000)], 0),
        (vec![SaleItem::new("Dal", -2, 1000)], 0),
        (vec![SaleItem::new("Dal", 1, -1000)], 0),
        (vec![SaleItem::new("Free sample", 1, 0)], 0),
        (vec![SaleItem::new("Dal", 1, 1000)], -1),
        (vec![SaleItem::new("Gold", i64::MAX, 2)], 0),
    ];
    for (items, cost) in rejected {
        let err = service.record_sale(items.clone(), cost, day).await.unwrap_err();
        assert!(err.is_validation(), "{:?} / {} gave {:?}", items, cost, err);
    }

    assert!(service.list_sales(day, day).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_list_sales_by_date_range() -> Result<()> {
    let (service, _temp) = test_service().await?;
    for (date, price) in [("2024-02-29", 1000), ("2024-03-01", 2000), ("2024-03-07", 3000), ("2024-03-08", 4000)] {
        service
            .record_sale(vec![SaleItem::new("Milk", 1, price)], 0, parse_date(date))
            .await?;
    }

    let amounts: Vec<i64> = service
        .list_sales(parse_date("2024-03-01"), parse_date("2024-03-07"))
        .await?
        .into_iter()
        .map(|s| s.amount)
        .collect();
    assert_eq!(amounts, [3000, 2000]);

    let err = service
        .list_sales(parse_date("2024-03-08"), parse_date("2024-03-01"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    Ok(())
}

#[tokio::test]
async fn test_seven_day_revenue_and_profit() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let sales = [
        // Outside the window
        ("2024-03-08", 50000, 10000),
        ("2024-03-09", 12000, 9000),
        ("2024-03-09", 8000, 5000),
        ("2024-03-12", 30000, 26000),
        ("2024-03-15", 4000, 6000),
        // After `today`
        ("2024-03-16", 99900, 0),
    ];
    for (date, price, cost) in sales {
        service
            .record_sale(vec![SaleItem::new("Groceries", 1, price)], cost, parse_date(date))
            .await?;
    }

    let summary = service.sales_summary(parse_date("2024-03-15"), 7).await?;
    assert_eq!(summary.from, parse_date("2024-03-09"));
    assert_eq!(summary.to, parse_date("2024-03-15"));
    assert_eq!(summary.sale_count, 4);
    assert_eq!(summary.revenue, 54000);
    assert_eq!(summary.profit, 8000);

    let per_day: Vec<_> = summary
        .days
        .iter()
        .map(|d| (d.date.to_string(), d.sale_count, d.revenue, d.profit))
        .collect();
    assert_eq!(
        per_day,
        [
            ("2024-03-09".to_string(), 2, 20000, 6000),
            ("2024-03-12".to_string(), 1, 30000, 4000),
            ("2024-03-15".to_string(), 1, 4000, -2000),
        ]
    );

    let single_day = service.sales_summary(parse_date("2024-03-09"), 1).await?;
    assert_eq!((single_day.sale_count, single_day.revenue), (2, 20000));

    assert!(service.sales_summary(parse_date("2024-03-15"), 0).await.unwrap_err().is_validation());
    Ok(())
}

#[tokio::test]
async fn test_dashboard_shows_latest_sales_day() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let today = parse_date("2024-03-20");
    assert!(service.dashboard_stats(today).await?.latest_sales.is_none());

    service
        .record_sale(vec![SaleItem::new("Oil 1L", 2, 16000)], 28000, parse_date("2024-03-17"))
        .await?;
    service
        .record_sale(vec![SaleItem::new("Bread", 1, 4500)], 3500, parse_date("2024-03-18"))
        .await?;
    service
        .record_sale(vec![SaleItem::new("Eggs", 12, 700)], 6000, parse_date("2024-03-18"))
        .await?;

    let latest = service
        .dashboard_stats(today)
        .await?
        .latest_sales
        .expect("a day with sales");
    assert_eq!(latest.date, parse_date("2024-03-18"));
    assert_eq!(latest.sale_count, 2);
    assert_eq!(latest.revenue, 12900);
    assert_eq!(latest.profit, 3400);
    Ok(())
}

#[tokio::test]
async fn test_sales_are_owner_scoped() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let day = parse_date("2024-03-15");
    service
        .record_sale(vec![SaleItem::new("Rice", 1, 6000)], 5000, day)
        .await?;

    let other = BusinessService::create(service.database().clone(), "Gupta General Store", None).await?;
    assert!(other.list_sales(day, day).await?.is_empty());
    assert_eq!(other.sales_summary(day, 7).await?.revenue, 0);
    assert!(other.dashboard_stats(day).await?.latest_sales.is_none());

    let snapshot = service.snapshot().await?;
    assert_eq!(snapshot.sales.len(), 1);
    assert!(other.snapshot().await?.sales.is_empty());
    Ok(())
}
