mod common;

use anyhow::Result;
use common::{BUSINESS, GSTIN, StandardCustomers, test_database, test_service};
use khata::application::{AppError, BusinessService};
use khata::domain::TransactionType;

#[tokio::test]
async fn test_add_customer_requires_name_and_phone() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service.add_customer("  ", "9845012345", 0).await.unwrap_err();
    assert!(err.is_validation());
    let err = service.add_customer("Ravi", "", 0).await.unwrap_err();
    assert!(err.is_validation());

    assert!(service.list_customers().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_add_customer_trims_and_keeps_opening_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let customer = service.add_customer("  Ravi Verma ", " 9811100000 ", -2500).await?;
    assert_eq!(customer.name, "Ravi Verma");
    assert_eq!(customer.phone, "9811100000");
    assert_eq!(customer.opening_balance, -2500);
    assert_eq!(customer.balance, -2500);
    assert!(customer.last_transaction.is_none());

    let stored = service.get_customer(customer.id).await?;
    assert_eq!(stored, customer);
    Ok(())
}

#[tokio::test]
async fn test_edit_details_leaves_balance_alone() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customers = StandardCustomers::create(&service).await?;
    service
        .record_payment(customers.rajesh.id, 10000, TransactionType::Debit, None)
        .await?;

    let updated = service
        .update_customer_details(customers.rajesh.id, None, Some("9000011111"))
        .await?;
    assert_eq!(updated.name, "Rajesh Kumar");
    assert_eq!(updated.phone, "9000011111");
    assert_eq!(updated.balance, -40000);

    let renamed = service
        .update_customer_details(customers.rajesh.id, Some("Rajesh K."), None)
        .await?;
    assert_eq!(renamed.name, "Rajesh K.");
    assert_eq!(renamed.phone, "9000011111");
    assert_eq!(renamed.balance, -40000);
    assert!(service.verify_ledgers().await?.is_healthy());
    Ok(())
}

#[tokio::test]
async fn test_edit_details_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customers = StandardCustomers::create(&service).await?;

    let err = service
        .update_customer_details(customers.priya.id, None, None)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = service
        .update_customer_details(customers.priya.id, Some(" "), None)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = service
        .update_customer_details(uuid::Uuid::new_v4(), Some("Nobody"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CustomerNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_resolve_customer() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customers = StandardCustomers::create(&service).await?;

    let by_name = service.resolve_customer("priya sharma").await?;
    assert_eq!(by_name.id, customers.priya.id);

    let by_id = service
        .resolve_customer(&customers.amit.id.to_string())
        .await?;
    assert_eq!(by_id.id, customers.amit.id);

    let err = service.resolve_customer("Suresh").await.unwrap_err();
    assert!(matches!(err, AppError::CustomerNotFound(_)));

    service.add_customer("Priya Sharma", "9000000001", 0).await?;
    let err = service.resolve_customer("Priya Sharma").await.unwrap_err();
    assert!(matches!(err, AppError::AmbiguousCustomer { count: 2, .. }));
    Ok(())
}

#[tokio::test]
async fn test_customer_orderings() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardCustomers::create(&service).await?;

    let names: Vec<String> = service
        .list_customers()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["Amit Patel", "Priya Sharma", "Rajesh Kumar"]);

    let balances: Vec<i64> = service
        .customers_by_balance()
        .await?
        .into_iter()
        .map(|c| c.balance)
        .collect();
    assert_eq!(balances, [-50000, 0, 30000]);
    Ok(())
}

#[tokio::test]
async fn test_list_cache_sees_new_customers() -> Result<()> {
    let (service, _temp) = test_service().await?;
    assert!(service.list_customers().await?.is_empty());

    service.add_customer("Deepak", "9000000002", 0).await?;
    assert_eq!(service.list_customers().await?.len(), 1);

    let customer = service.add_customer("Esha", "9000000003", 0).await?;
    service
        .update_customer_details(customer.id, Some("Esha Rao"), None)
        .await?;
    let names: Vec<String> = service
        .list_customers()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["Deepak", "Esha Rao"]);
    Ok(())
}

#[tokio::test]
async fn test_owners_are_isolated() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customers = StandardCustomers::create(&service).await?;
    let other = BusinessService::create(service.database().clone(), "Gupta General Store", None).await?;

    assert!(other.list_customers().await?.is_empty());
    assert!(other.resolve_customer("Rajesh Kumar").await.is_err());

    let err = other
        .record_payment(customers.rajesh.id, 100, TransactionType::Debit, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CustomerNotFound(_)));

    let err = other
        .update_customer_details(customers.rajesh.id, Some("Hijacked"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CustomerNotFound(_)));

    let rajesh = service.get_customer(customers.rajesh.id).await?;
    assert_eq!(rajesh.name, "Rajesh Kumar");
    assert_eq!(rajesh.balance, -50000);
    assert!(other.verify_ledgers().await?.is_healthy());
    assert_eq!(other.verify_ledgers().await?.customer_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_profiles() -> Result<()> {
    let (db, _temp) = test_database().await?;

    let created = BusinessService::create(db.clone(), BUSINESS, Some(GSTIN.to_lowercase())).await?;
    assert_eq!(created.profile().gstin.as_deref(), Some(GSTIN));

    let err = BusinessService::create(db.clone(), BUSINESS, None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::ProfileAlreadyExists(_)));

    let err = BusinessService::create(db.clone(), "   ", None).await.err().unwrap();
    assert!(err.is_validation());

    let err = BusinessService::open(db.clone(), "Unknown Traders").await.err().unwrap();
    assert!(matches!(err, AppError::ProfileNotFound(_)));

    let mut opened = BusinessService::open(db.clone(), BUSINESS).await?;
    assert_eq!(opened.owner_id(), created.owner_id());
    assert_eq!(db.get_profile(created.owner_id()).await?.as_ref(), Some(created.profile()));

    opened.set_gstin(None).await?;
    let reopened = BusinessService::open(db.clone(), BUSINESS).await?;
    assert_eq!(reopened.profile().gstin, None);
    assert_eq!(db.list_profiles().await?.len(), 1);
    Ok(())
}
