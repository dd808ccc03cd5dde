//! SQLite dialect.
//!
//! SQLite has no server-side dynamic SQL, so DDL is composed from names the
//! engine has already quoted and from types re-rendered out of the closed
//! [`SqlType`] set. Unbounded lengths are written as `(-1)` because the type
//! grammar only takes signed numbers.
//!
//! SQLite cannot alter a column's type, so widening uses the table
//! recreation strategy: create a new table, copy data, drop the old table,
//! rename the new table.

use crate::definition::TableDefinition;
use crate::error::Result;
use crate::schema::{ColumnSpec, Schema};
use crate::types::SqlType;

use super::{
    join_equal, qualified, Dialect, Identifiers, MergeMode, MergePlan, SelectPlan, Statement,
};

/// Longest identifier the sanitizer accepts.
const MAX_IDENTIFIER_LEN: usize = 128;

/// SQLite dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Type as declared in SQLite DDL.
    fn type_name(sql_type: &SqlType) -> String {
        sql_type.to_string().replace("(MAX)", "(-1)")
    }

    fn column_definition(column: &ColumnSpec, name: &str) -> String {
        if column.is_identity {
            // rowid alias; introspection recognizes it by the INTEGER spelling
            return format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT");
        }
        let mut sql = format!("{name} {}", Self::type_name(&column.sql_type));
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        sql
    }

    fn create_table_sql(
        table: &str,
        columns: &[ColumnSpec],
        names: &Identifiers,
    ) -> Result<String> {
        let mut defs = Vec::with_capacity(columns.len() + 1);
        for column in columns {
            defs.push(Self::column_definition(column, names.get(&column.name)?));
        }
        let key: Vec<&ColumnSpec> = columns
            .iter()
            .filter(|c| c.is_primary_key && !c.is_identity)
            .collect();
        if !key.is_empty() {
            let quoted = key
                .iter()
                .map(|c| names.get(&c.name))
                .collect::<Result<Vec<_>>>()?;
            defs.push(format!("PRIMARY KEY ({})", quoted.join(", ")));
        }

        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(table);
        sql.push_str(" (\n  ");
        sql.push_str(&defs.join(",\n  "));
        sql.push_str("\n)");
        Ok(sql)
    }

    fn delete_unmatched(plan: &MergePlan<'_>, names: &Identifiers) -> Result<Statement> {
        let target = names.get(plan.target)?;
        let source = names.get(plan.source)?;
        let matches = names.all(plan.match_columns)?;

        let mut sql = format!(
            "DELETE FROM {target} WHERE NOT EXISTS (SELECT 1 FROM {source} AS _source WHERE {})",
            join_equal("_source", target, &matches)
        );
        for column in names.all(plan.subset_columns)? {
            sql.push_str(&format!(
                " AND {target}.{column} IN (SELECT _source.{column} FROM {source} AS _source)"
            ));
        }
        Ok(Statement::new(sql))
    }

    fn update_matched(plan: &MergePlan<'_>, names: &Identifiers) -> Result<Option<Statement>> {
        let updates = names.all(&plan.update_columns())?;
        if updates.is_empty() {
            return Ok(None);
        }
        let target = names.get(plan.target)?;
        let source = names.get(plan.source)?;
        let matches = names.all(plan.match_columns)?;

        let mut assignments: Vec<String> = updates
            .iter()
            .map(|c| format!("{c} = _source.{c}"))
            .collect();
        let mut params = Vec::new();
        if let Some(column) = plan.time_update {
            assignments.push(format!("{} = ?", names.get(column)?));
            params.push(plan.timestamp.clone());
        }
        let changed = updates
            .iter()
            .map(|c| format!("_target.{c} IS NOT _source.{c}"))
            .collect::<Vec<_>>()
            .join(" OR ");

        let sql = format!(
            "UPDATE {target} AS _target SET {} FROM {source} AS _source WHERE {} AND ({changed})",
            assignments.join(", "),
            join_equal("_target", "_source", &matches),
        );
        Ok(Some(Statement::with_params(sql, params)))
    }

    fn insert_unmatched(plan: &MergePlan<'_>, names: &Identifiers) -> Result<Statement> {
        let target = names.get(plan.target)?;
        let source = names.get(plan.source)?;
        let columns = names.all(plan.columns)?;
        let matches = names.all(plan.match_columns)?;

        let mut insert_columns = columns.join(", ");
        let mut select_columns = qualified("_source", &columns);
        let mut params = Vec::new();
        if let Some(column) = plan.time_insert {
            insert_columns.push_str(", ");
            insert_columns.push_str(names.get(column)?);
            select_columns.push_str(", ?");
            params.push(plan.timestamp.clone());
        }

        let sql = format!(
            "INSERT INTO {target} ({insert_columns}) SELECT {select_columns} FROM {source} AS _source \
             WHERE NOT EXISTS (SELECT 1 FROM {target} AS _target WHERE {})",
            join_equal("_target", "_source", &matches)
        );
        Ok(Statement::with_params(sql, params))
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn max_params(&self) -> usize {
        32_766
    }

    fn sanitize(&self, identifiers: &[String]) -> Statement {
        let expressions: Vec<String> = (1..=identifiers.len())
            .map(|i| {
                format!(
                    "CASE WHEN length(?{i}) BETWEEN 1 AND {MAX_IDENTIFIER_LEN} AND instr(?{i}, char(0)) = 0 \
                     THEN '\"' || replace(?{i}, '\"', '\"\"') || '\"' END"
                )
            })
            .collect();
        Statement::with_params(
            format!("SELECT {}", expressions.join(", ")),
            identifiers.iter().cloned().map(Into::into).collect(),
        )
    }

    fn unquote(&self, identifier: &str) -> Option<String> {
        let inner = identifier.strip_prefix('"')?.strip_suffix('"')?;
        // every quote inside must be doubled
        let mut name = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '"' && chars.next() != Some('"') {
                return None;
            }
            name.push(c);
        }
        Some(name)
    }

    fn table_info(&self, table: &str) -> Statement {
        Statement::with_params(
            "SELECT name AS column_name, type AS declared_type, \"notnull\" AS not_null, \
             pk > 0 AS is_primary_key, (pk > 0 AND upper(type) = 'INTEGER') AS is_identity \
             FROM pragma_table_info(?) ORDER BY cid",
            vec![table.into()],
        )
    }

    fn create_table(&self, definition: &TableDefinition, names: &Identifiers) -> Result<Statement> {
        let columns = definition.columns()?;
        let sql = Self::create_table_sql(names.get(definition.table())?, &columns, names)?;
        Ok(Statement::new(sql))
    }

    fn add_column(
        &self,
        table: &str,
        column: &ColumnSpec,
        names: &Identifiers,
    ) -> Result<Statement> {
        Ok(Statement::new(format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            names.get(table)?,
            names.get(&column.name)?,
            Self::type_name(&column.sql_type)
        )))
    }

    fn alter_column(
        &self,
        schema: &Schema,
        column: &ColumnSpec,
        names: &Identifiers,
    ) -> Result<Vec<Statement>> {
        let table = names.get(schema.table())?;
        let rebuilt = self.rebuild_table(schema.table()).unwrap_or_default();
        let rebuilt = names.get(&rebuilt)?;

        let columns: Vec<ColumnSpec> = schema
            .columns()
            .iter()
            .map(|c| {
                if c.name == column.name {
                    ColumnSpec {
                        sql_type: column.sql_type,
                        ..c.clone()
                    }
                } else {
                    c.clone()
                }
            })
            .collect();
        let quoted = names.all(&schema.names())?.join(", ");

        Ok(vec![
            Statement::new(format!("DROP TABLE IF EXISTS {rebuilt}")),
            Statement::new(Self::create_table_sql(rebuilt, &columns, names)?),
            Statement::new(format!(
                "INSERT INTO {rebuilt} ({quoted}) SELECT {quoted} FROM {table}"
            )),
            Statement::new(format!("DROP TABLE {table}")),
            Statement::new(format!("ALTER TABLE {rebuilt} RENAME TO {table}")),
        ])
    }

    fn scratch_table(&self, table: &str) -> String {
        format!("tabsql_infer_{table}")
    }

    fn source_table(&self, table: &str) -> String {
        format!("tabsql_source_{table}")
    }

    fn rebuild_table(&self, table: &str) -> Option<String> {
        Some(format!("tabsql_rebuild_{table}"))
    }

    fn stage_scratch(
        &self,
        scratch: &str,
        width: usize,
        names: &Identifiers,
    ) -> Result<Vec<Statement>> {
        let scratch = names.get(scratch)?;
        let columns = names
            .all(&self.scratch_columns(width))?
            .into_iter()
            .map(|c| format!("{c} TEXT"))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(vec![
            Statement::new(format!("DROP TABLE IF EXISTS temp.{scratch}")),
            Statement::new(format!("CREATE TEMP TABLE {scratch} ({columns})")),
        ])
    }

    fn infer_probe(
        &self,
        scratch: &str,
        columns: &[String],
        names: &Identifiers,
    ) -> Result<Statement> {
        let scratch = names.get(scratch)?;
        let staged = names.all(&self.scratch_columns(columns.len()))?;
        let sample = staged
            .iter()
            .map(|c| format!("SELECT ? AS column_name, {c} AS v FROM temp.{scratch}"))
            .collect::<Vec<_>>()
            .join(" UNION ALL ");

        // an integer survives a text -> integer -> text round trip unchanged
        let int_in = |lo: i64, hi: i64| {
            format!(
                "SUM(CAST(CAST(v AS INTEGER) AS TEXT) = v \
                 AND CAST(v AS INTEGER) BETWEEN {lo} AND {hi}) = COUNT(*)"
            )
        };
        // date() and time() roll impossible values forward, so the
        // normalized text must equal the staged text
        let clock = |at: usize| {
            format!(
                "time(v) = substr(v, {at}, 8) AND (length(v) = {whole} \
                 OR (substr(v, {dot}, 1) = '.' AND length(v) > {dot} \
                 AND NOT substr(v, {digits}) GLOB '*[^0-9]*'))",
                whole = at + 7,
                dot = at + 8,
                digits = at + 9,
            )
        };
        let calendar = "v GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]*' \
                        AND date(v) = substr(v, 1, 10)";

        let sql = format!(
            "WITH sample(column_name, v) AS ({sample}) \
             SELECT column_name, CASE \
             WHEN COUNT(*) > 2 AND SUM(v IN ('0', '1')) = COUNT(*) AND MAX(v) = '1' THEN 'bit' \
             WHEN {} THEN 'tinyint' \
             WHEN {} THEN 'smallint' \
             WHEN {} THEN 'int' \
             WHEN {} THEN 'bigint' \
             WHEN SUM(v GLOB '[0-9][0-9]:[0-9][0-9]:[0-9][0-9]*' AND {}) = COUNT(*) THEN 'time' \
             WHEN SUM({calendar} AND length(v) = 10) = COUNT(*) THEN 'date' \
             WHEN SUM({calendar} AND (length(v) = 10 \
             OR (substr(v, 11, 1) IN (' ', 'T') AND {}))) = COUNT(*) THEN 'datetime2' \
             WHEN SUM(CASE WHEN json_valid(v) THEN json_type(v) IN ('integer', 'real') ELSE 0 END) \
             = COUNT(*) THEN 'float' \
             ELSE 'varchar' END AS type_name, \
             MAX(length(v)) AS max_len \
             FROM sample WHERE v IS NOT NULL GROUP BY column_name",
            int_in(0, 255),
            int_in(i64::from(i16::MIN), i64::from(i16::MAX)),
            int_in(i64::from(i32::MIN), i64::from(i32::MAX)),
            int_in(i64::MIN, i64::MAX),
            clock(1),
            clock(12),
        );
        Ok(Statement::with_params(
            sql,
            columns.iter().cloned().map(Into::into).collect(),
        ))
    }

    fn stage_source(
        &self,
        target: &str,
        source: &str,
        columns: &[String],
        names: &Identifiers,
    ) -> Result<Vec<Statement>> {
        let target = names.get(target)?;
        let source = names.get(source)?;
        let columns = names.all(columns)?.join(", ");
        Ok(vec![
            Statement::new(format!("DROP TABLE IF EXISTS temp.{source}")),
            Statement::new(format!(
                "CREATE TEMP TABLE {source} AS SELECT {columns} FROM {target} WHERE 0"
            )),
        ])
    }

    fn drop_table(&self, table: &str, names: &Identifiers) -> Result<Statement> {
        Ok(Statement::new(format!(
            "DROP TABLE IF EXISTS {}",
            names.get(table)?
        )))
    }

    fn merge(&self, plan: &MergePlan<'_>, names: &Identifiers) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        if plan.mode == MergeMode::Merge {
            statements.push(Self::delete_unmatched(plan, names)?);
        }
        if let Some(update) = Self::update_matched(plan, names)? {
            statements.push(update);
        }
        if plan.mode != MergeMode::Update {
            statements.push(Self::insert_unmatched(plan, names)?);
        }
        Ok(statements)
    }

    fn select(&self, plan: &SelectPlan<'_>, names: &Identifiers) -> Result<Statement> {
        let columns = if plan.columns.is_empty() {
            "*".to_string()
        } else {
            names.all(plan.columns)?.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", names.get(plan.table)?);
        let mut params = Vec::new();
        if let Some((predicate, args)) = &plan.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
            params.extend(args.iter().cloned());
        }
        if let Some((column, order)) = plan.order_by {
            sql.push_str(&format!(" ORDER BY {} {}", names.get(column)?, order.as_sql()));
        }
        if let Some(limit) = plan.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(Statement::with_params(sql, params))
    }
}
