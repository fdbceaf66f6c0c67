pub(crate) async fn ping(executor: impl sqlx::PgExecutor<'_>) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(executor).await?;
    Ok(())
}
