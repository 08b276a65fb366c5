use super::*;

const EXECUTION_COLUMNS: &str = r#"
    id,
    definition_logical_name,
    action_kind,
    fingerprint,
    trigger_origin,
    trigger_instance_key,
    trigger_payload,
    initiated_by,
    dry_run,
    state,
    action_config,
    blocked_reason,
    result,
    failure_reason,
    cancellation,
    rollback_id,
    created_at,
    safety_evaluated_at,
    execution_started_at,
    finished_at
"#;

const TERMINAL_STATES_SQL: &str =
    "('rejected_unsafe', 'completed', 'failed', 'cancelled', 'rolled_back')";

impl PostgresRemediationRepository {
    pub(super) async fn create_execution_impl(
        &self,
        tenant_id: TenantId,
        input: CreateExecutionInput,
    ) -> AppResult<ActionExecution> {
        // The partial unique index on (tenant_id, fingerprint) over
        // non-terminal rows turns a lost submit race into a unique violation.
        let sql = format!(
            r#"
            INSERT INTO remediation_executions (
                tenant_id,
                definition_logical_name,
                action_kind,
                fingerprint,
                trigger_origin,
                trigger_instance_key,
                trigger_payload,
                initiated_by,
                dry_run,
                state,
                action_config,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'created', $10, now())
            RETURNING {EXECUTION_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ExecutionRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(input.definition_logical_name.as_str())
            .bind(input.action_kind.as_str())
            .bind(input.fingerprint.as_str())
            .bind(input.trigger_origin.as_str())
            .bind(input.trigger_instance_key.as_str())
            .bind(&input.trigger_payload)
            .bind(input.initiated_by.as_str())
            .bind(input.dry_run)
            .bind(&input.action_config)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                if error
                    .as_database_error()
                    .is_some_and(|db_error| db_error.is_unique_violation())
                {
                    AppError::Conflict(format!(
                        "an active execution already holds fingerprint '{}' for tenant '{tenant_id}'",
                        input.fingerprint
                    ))
                } else {
                    AppError::Internal(format!(
                        "failed to create execution of '{}' for tenant '{tenant_id}': {error}",
                        input.definition_logical_name
                    ))
                }
            })?;

        execution_from_row(row)
    }

    pub(super) async fn find_execution_impl(
        &self,
        tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<ActionExecution>> {
        let execution_id = parse_uuid(execution_id, "execution id")?;
        let sql = format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM remediation_executions
            WHERE tenant_id = $1 AND id = $2
            "#
        );

        let row = sqlx::query_as::<_, ExecutionRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to load execution '{execution_id}' for tenant '{tenant_id}': {error}"
                ))
            })?;

        row.map(execution_from_row).transpose()
    }

    pub(super) async fn find_active_execution_by_fingerprint_impl(
        &self,
        tenant_id: TenantId,
        fingerprint: &str,
    ) -> AppResult<Option<ActionExecution>> {
        let sql = format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM remediation_executions
            WHERE tenant_id = $1
              AND fingerprint = $2
              AND state NOT IN {TERMINAL_STATES_SQL}
            "#
        );

        let row = sqlx::query_as::<_, ExecutionRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to look up active execution by fingerprint for tenant '{tenant_id}': {error}"
                ))
            })?;

        row.map(execution_from_row).transpose()
    }

    pub(super) async fn transition_execution_impl(
        &self,
        tenant_id: TenantId,
        transition: ExecutionTransition,
    ) -> AppResult<ActionExecution> {
        if !transition
            .expected_state
            .can_transition_to(transition.next_state)
        {
            return Err(AppError::InvalidTransition(format!(
                "execution '{}' cannot move from '{}' to '{}'",
                transition.execution_id,
                transition.expected_state.as_str(),
                transition.next_state.as_str()
            )));
        }

        let execution_id = parse_uuid(transition.execution_id.as_str(), "execution id")?;
        let rollback_id = transition
            .rollback_id
            .as_deref()
            .map(|value| parse_uuid(value, "rollback id"))
            .transpose()?;
        let cancellation = transition
            .cancellation
            .as_ref()
            .map(|record| {
                serde_json::to_value(record).map_err(|error| {
                    AppError::Internal(format!(
                        "failed to encode cancellation record for execution '{execution_id}': {error}"
                    ))
                })
            })
            .transpose()?;

        // The state guard in the WHERE clause is the single-writer discipline
        // for execution rows: a concurrent transition loses and surfaces as
        // an invalid-transition error.
        let sql = format!(
            r#"
            UPDATE remediation_executions
            SET
                state = $4,
                action_config = COALESCE($5, action_config),
                blocked_reason = COALESCE($6, blocked_reason),
                result = COALESCE($7, result),
                failure_reason = COALESCE($8, failure_reason),
                cancellation = COALESCE($9, cancellation),
                rollback_id = COALESCE($10, rollback_id),
                safety_evaluated_at = CASE
                    WHEN $3 = 'safety_check' THEN now()
                    ELSE safety_evaluated_at
                END,
                execution_started_at = CASE
                    WHEN $4 = 'executing' THEN now()
                    ELSE execution_started_at
                END,
                finished_at = CASE
                    WHEN $4 IN {TERMINAL_STATES_SQL} THEN now()
                    ELSE finished_at
                END
            WHERE tenant_id = $1 AND id = $2 AND state = $3
            RETURNING {EXECUTION_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ExecutionRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(execution_id)
            .bind(transition.expected_state.as_str())
            .bind(transition.next_state.as_str())
            .bind(&transition.action_config)
            .bind(&transition.blocked_reason)
            .bind(&transition.result)
            .bind(&transition.failure_reason)
            .bind(&cancellation)
            .bind(rollback_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to transition execution '{execution_id}' for tenant '{tenant_id}': {error}"
                ))
            })?;

        match row {
            Some(row) => execution_from_row(row),
            None => {
                let current = self
                    .find_execution_impl(tenant_id, execution_id.to_string().as_str())
                    .await?;
                match current {
                    Some(execution) => Err(AppError::InvalidTransition(format!(
                        "execution '{execution_id}' is '{}', expected '{}'",
                        execution.state.as_str(),
                        transition.expected_state.as_str()
                    ))),
                    None => Err(AppError::NotFound(format!(
                        "execution '{execution_id}' does not exist"
                    ))),
                }
            }
        }
    }

    pub(super) async fn list_executions_impl(
        &self,
        tenant_id: TenantId,
        query: ExecutionListQuery,
    ) -> AppResult<Vec<ActionExecution>> {
        let sql = format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM remediation_executions
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR definition_logical_name = $2)
              AND ($3::text IS NULL OR state = $3)
              AND ($4::text IS NULL OR trigger_origin = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#
        );

        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, ExecutionRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(query.definition_logical_name.as_deref())
            .bind(query.state.map(|state| state.as_str()))
            .bind(query.trigger_origin.map(|origin| origin.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list executions for tenant '{tenant_id}': {error}"
                ))
            })?;

        rows.into_iter().map(execution_from_row).collect()
    }

    pub(super) async fn execution_stats_impl(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<ExecutionStats> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                count(*) AS total,
                count(*) FILTER (WHERE state = 'pending_approval') AS pending_approval,
                count(*) FILTER (WHERE state = 'executing') AS executing,
                count(*) FILTER (WHERE state = 'completed') AS completed,
                count(*) FILTER (WHERE state = 'failed') AS failed,
                count(*) FILTER (WHERE state = 'rejected_unsafe') AS rejected_unsafe,
                count(*) FILTER (WHERE state = 'cancelled') AS cancelled,
                count(*) FILTER (WHERE state = 'rolled_back') AS rolled_back,
                count(*) FILTER (WHERE dry_run) AS dry_runs
            FROM remediation_executions
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to aggregate execution stats for tenant '{tenant_id}': {error}"
            ))
        })?;

        Ok(row.into())
    }
}
