use super::models::{
    Aggregation, CollectionSelector, CountAggregation, Cursor, Direction, FieldFilter,
    FieldOperator, FieldReference, Order, QueryFilter, RunAggregationQueryRequest,
    RunAggregationQueryResponse, RunQueryRequest, RunQueryResponse, StructuredAggregationQuery,
    StructuredQuery, Value, ValueType,
};
use super::reference::convert_serde_value_to_firestore_value;
use super::snapshot::{DocumentSnapshot, QuerySnapshot};
use super::FirestoreError;
use crate::core::parse_error_response;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use tracing::{debug, instrument};

const DOCUMENT_ID_FIELD: &str = "__name__";
const COUNT_ALIAS: &str = "total";

/// A definition of a Firestore query over a single collection: at most one field filter,
/// orderings, a limit and a start-after cursor.
#[derive(Clone, Debug)]
pub struct Query {
    pub(crate) collection_id: String,
    pub(crate) query: StructuredQuery,
}

impl Query {
    /// Creates a new `Query` targeting the specified collection.
    pub fn new(collection_id: impl Into<String>) -> Self {
        let collection_id = collection_id.into();
        Self {
            query: StructuredQuery {
                from: Some(vec![CollectionSelector {
                    collection_id: collection_id.clone(),
                }]),
                ..Default::default()
            },
            collection_id,
        }
    }

    /// Sets the query's field filter, replacing any previous one.
    pub fn where_filter<T: Serialize>(
        mut self,
        field: &str,
        op: FieldOperator,
        value: T,
    ) -> Result<Self, FirestoreError> {
        let serde_value = serde_json::to_value(value)?;
        let firestore_value = convert_serde_value_to_firestore_value(serde_value)?;

        if op.takes_list() && !matches!(firestore_value.value_type, ValueType::ArrayValue(_)) {
            return Err(FirestoreError::InvalidQuery(format!(
                "operator {:?} requires a list of values",
                op
            )));
        }

        self.query.where_clause = Some(QueryFilter {
            field_filter: FieldFilter {
                field: FieldReference {
                    field_path: field.to_string(),
                },
                op,
                value: firestore_value,
            },
        });

        Ok(self)
    }

    /// Sorts the query results by the specified field.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        let order = Order {
            field: FieldReference {
                field_path: field.to_string(),
            },
            direction,
        };

        self.query.order_by.get_or_insert_with(Vec::new).push(order);
        self
    }

    /// Limits the number of documents returned.
    pub fn limit(mut self, limit: i32) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Starts the results strictly after `snapshot`.
    ///
    /// The cursor carries one value per effective ordering, so the orderings are made
    /// explicit here the same way the backend would infer them: an inequality filter
    /// orders by its field first, and the document name always breaks ties.
    pub fn start_after(mut self, snapshot: &DocumentSnapshot) -> Result<Self, FirestoreError> {
        let name = snapshot.name().ok_or_else(|| {
            FirestoreError::InvalidQuery(format!(
                "cursor document '{}' does not exist",
                snapshot.id()
            ))
        })?;

        let explicit_name_direction = self
            .query
            .order_by
            .iter()
            .flatten()
            .find(|o| o.field.field_path == DOCUMENT_ID_FIELD)
            .map(|o| o.direction);

        let mut orders = self.effective_orders();
        let name_direction = explicit_name_direction
            .or_else(|| orders.last().map(|o| o.direction))
            .unwrap_or_default();
        orders.push(Order {
            field: FieldReference {
                field_path: DOCUMENT_ID_FIELD.to_string(),
            },
            direction: name_direction,
        });

        let mut values = Vec::with_capacity(orders.len());
        for order in &orders {
            if order.field.field_path == DOCUMENT_ID_FIELD {
                values.push(Value {
                    value_type: ValueType::ReferenceValue(name.to_string()),
                });
                continue;
            }
            let value = snapshot.get_field(&order.field.field_path).ok_or_else(|| {
                FirestoreError::InvalidQuery(format!(
                    "cursor document '{}' has no value for ordered field '{}'",
                    snapshot.id(),
                    order.field.field_path
                ))
            })?;
            values.push(value.clone());
        }

        self.query.order_by = Some(orders);
        self.query.start_at = Some(Cursor {
            values,
            before: false,
        });
        Ok(self)
    }

    fn effective_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .query
            .order_by
            .iter()
            .flatten()
            .filter(|o| o.field.field_path != DOCUMENT_ID_FIELD)
            .cloned()
            .collect();

        if orders.is_empty() {
            if let Some(filter) = &self.query.where_clause {
                if filter.field_filter.op.is_inequality() {
                    orders.push(Order {
                        field: filter.field_filter.field.clone(),
                        direction: Direction::Ascending,
                    });
                }
            }
        }
        orders
    }

    /// The query stripped down to what a count needs: source and filter.
    fn for_count(&self) -> StructuredQuery {
        StructuredQuery {
            from: self.query.from.clone(),
            where_clause: self.query.where_clause.clone(),
            ..Default::default()
        }
    }
}

/// A `Query` attached to a Firestore client, ready for execution.
#[derive(Clone)]
pub struct ExecutableQuery<'a> {
    pub(crate) client: &'a ClientWithMiddleware,
    pub(crate) parent_path: String,
    pub(crate) query: Query,
}

impl<'a> ExecutableQuery<'a> {
    pub(crate) fn new(client: &'a ClientWithMiddleware, parent_path: String, collection_id: &str) -> Self {
        Self {
            client,
            parent_path,
            query: Query::new(collection_id),
        }
    }

    // Proxy methods to modify the underlying Query (builder pattern on ExecutableQuery)

    /// Sets the field filter.
    pub fn where_filter<T: Serialize>(
        self,
        field: &str,
        op: FieldOperator,
        value: T,
    ) -> Result<Self, FirestoreError> {
        Ok(Self {
            query: self.query.where_filter(field, op, value)?,
            ..self
        })
    }

    /// Sorts the query results.
    pub fn order_by(self, field: &str, direction: Direction) -> Self {
        Self {
            query: self.query.order_by(field, direction),
            ..self
        }
    }

    /// Limits the results.
    pub fn limit(self, limit: i32) -> Self {
        Self {
            query: self.query.limit(limit),
            ..self
        }
    }

    /// Starts the results strictly after the given document.
    pub fn start_after(self, snapshot: &DocumentSnapshot) -> Result<Self, FirestoreError> {
        Ok(Self {
            query: self.query.start_after(snapshot)?,
            ..self
        })
    }

    /// Executes the query and returns the results as a `QuerySnapshot`.
    #[instrument(skip(self), fields(collection = %self.query.collection_id))]
    pub async fn get(&self) -> Result<QuerySnapshot, FirestoreError> {
        let url = format!("{}:runQuery", self.parent_path);

        let request = RunQueryRequest {
            structured_query: self.query.query.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Run query failed").await,
            ));
        }

        let responses: Vec<RunQueryResponse> = response.json().await?;

        let mut documents = Vec::new();
        let mut read_time = None;

        for res in responses {
            if let Some(rt) = res.read_time {
                read_time = Some(rt);
            }

            if let Some(doc) = res.document {
                documents.push(DocumentSnapshot::from_document(doc));
            }
        }

        debug!(count = documents.len(), "query returned documents");
        Ok(QuerySnapshot {
            documents,
            read_time,
        })
    }

    /// Counts the documents matching the query's filter, ignoring limit, ordering and cursor.
    #[instrument(skip(self), fields(collection = %self.query.collection_id))]
    pub async fn count(&self) -> Result<u64, FirestoreError> {
        let url = format!("{}:runAggregationQuery", self.parent_path);

        let request = RunAggregationQueryRequest {
            structured_aggregation_query: StructuredAggregationQuery {
                structured_query: self.query.for_count(),
                aggregations: vec![Aggregation {
                    alias: COUNT_ALIAS.to_string(),
                    count: CountAggregation::default(),
                }],
            },
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Count query failed").await,
            ));
        }

        let responses: Vec<RunAggregationQueryResponse> = response.json().await?;

        let value = responses
            .into_iter()
            .filter_map(|res| res.result)
            .find_map(|mut result| result.aggregate_fields.remove(COUNT_ALIAS))
            .ok_or_else(|| {
                FirestoreError::InvalidResponse("aggregation result has no count".to_string())
            })?;

        match value.value_type {
            ValueType::IntegerValue(s) => s.parse().map_err(|e| {
                FirestoreError::InvalidResponse(format!("invalid count '{}': {}", s, e))
            }),
            other => Err(FirestoreError::InvalidResponse(format!(
                "unexpected count value: {:?}",
                other
            ))),
        }
    }
}
