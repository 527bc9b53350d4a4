use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::operation::create_table::{CreateTableError, CreateTableOutput};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
};
use tracing::debug;

use crate::Error;

/// Create a table keyed by string attributes, billed on demand
///
/// An already existing table counts as success, which makes this safe to
/// call at the start of every test.
pub async fn create_table(
    client: &DynamoDbClient,
    table: &str,
    partition_key: &str,
    sort_key: Option<&str>,
) -> Result<CreateTableOutput, Error> {
    let mut builder = client
        .create_table()
        .table_name(table)
        .billing_mode(BillingMode::PayPerRequest)
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name(partition_key)
                .key_type(KeyType::Hash)
                .build()?,
        )
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(partition_key)
                .attribute_type(ScalarAttributeType::S)
                .build()?,
        );

    if let Some(sort_key) = sort_key {
        builder = builder
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(sort_key)
                    .key_type(KeyType::Range)
                    .build()?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(sort_key)
                    .attribute_type(ScalarAttributeType::S)
                    .build()?,
            );
    }

    match builder.send().await {
        Ok(output) => Ok(output),
        Err(e) => {
            if let Some(CreateTableError::ResourceInUseException(_)) = e.as_service_error() {
                debug!(table, "table already exists");
                return Ok(CreateTableOutput::builder().build());
            }
            Err(e.into())
        }
    }
}
