//! SQL Server (T-SQL) dialect.
//!
//! Structural SQL that must embed caller-provided names is assembled on the
//! server: names, type names and sizes are bound as parameters, quoted with
//! `QUOTENAME` and executed through `sp_executesql`. Nothing the caller
//! supplies is concatenated into the statement text.

use crate::definition::TableDefinition;
use crate::error::Result;
use crate::schema::{ColumnSpec, Schema};
use crate::value::Value;

use super::{
    join_equal, qualified, Dialect, Identifiers, MergeMode, MergePlan, SelectPlan, Statement,
};

/// SQL Server dialect.
#[derive(Debug, Clone, Default)]
pub struct TsqlDialect;

impl TsqlDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Doubles single quotes so `sql` can sit inside `N'...'`.
    fn literal(sql: &str) -> String {
        sql.replace('\'', "''")
    }

    fn probe_case() -> &'static str {
        "CASE \
         WHEN COUNT(*) > 2 AND SUM(CASE WHEN ColumnValue IN ('0', '1') THEN 0 ELSE 1 END) = 0 \
         AND MAX(ColumnValue) = '1' THEN 'bit' \
         WHEN COUNT(TRY_CONVERT(TINYINT, ColumnValue)) = COUNT(*) THEN 'tinyint' \
         WHEN COUNT(TRY_CONVERT(SMALLINT, ColumnValue)) = COUNT(*) THEN 'smallint' \
         WHEN COUNT(TRY_CONVERT(INT, ColumnValue)) = COUNT(*) THEN 'int' \
         WHEN COUNT(TRY_CONVERT(BIGINT, ColumnValue)) = COUNT(*) THEN 'bigint' \
         WHEN COUNT(TRY_CONVERT(TIME, ColumnValue)) = COUNT(*) \
         AND SUM(CASE WHEN TRY_CONVERT(DATE, ColumnValue) = '1900-01-01' THEN 0 ELSE 1 END) = 0 \
         THEN 'time' \
         WHEN COUNT(TRY_CONVERT(DATE, ColumnValue)) = COUNT(*) AND MAX(LEN(ColumnValue)) = 10 \
         THEN 'date' \
         WHEN COUNT(TRY_CONVERT(DATETIME2, ColumnValue)) = COUNT(*) THEN 'datetime2' \
         WHEN COUNT(TRY_CONVERT(FLOAT, ColumnValue)) = COUNT(*) THEN 'float' \
         ELSE 'varchar' END"
    }
}

impl Dialect for TsqlDialect {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn max_params(&self) -> usize {
        // the hard limit is 2100
        2000
    }

    fn max_rows(&self) -> usize {
        1000
    }

    fn sanitize(&self, identifiers: &[String]) -> Statement {
        let columns = vec!["QUOTENAME(NULLIF(?, ''))"; identifiers.len()].join(", ");
        Statement::with_params(
            format!("SELECT {columns}"),
            identifiers.iter().cloned().map(Into::into).collect(),
        )
    }

    fn unquote(&self, identifier: &str) -> Option<String> {
        let inner = identifier.strip_prefix('[')?.strip_suffix(']')?;
        let mut name = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == ']' && chars.next() != Some(']') {
                return None;
            }
            name.push(c);
        }
        Some(name)
    }

    fn table_info(&self, table: &str) -> Statement {
        Statement::with_params(
            "SELECT \
             c.name AS column_name, \
             t.name + CASE \
                 WHEN t.name IN ('varchar', 'char') THEN '(' + CAST(c.max_length AS VARCHAR(10)) + ')' \
                 WHEN t.name IN ('nvarchar', 'nchar') THEN '(' + CAST(CASE WHEN c.max_length = -1 THEN -1 \
                     ELSE c.max_length / 2 END AS VARCHAR(10)) + ')' \
                 WHEN t.name IN ('decimal', 'numeric') THEN '(' + CAST(c.precision AS VARCHAR(3)) + ',' \
                     + CAST(c.scale AS VARCHAR(3)) + ')' \
                 ELSE '' END AS declared_type, \
             CAST(CASE WHEN c.is_nullable = 1 THEN 0 ELSE 1 END AS BIT) AS not_null, \
             CAST(CASE WHEN pk.column_id IS NULL THEN 0 ELSE 1 END AS BIT) AS is_primary_key, \
             c.is_identity AS is_identity \
             FROM sys.columns AS c \
             INNER JOIN sys.types AS t ON t.user_type_id = c.user_type_id \
             LEFT JOIN ( \
                 SELECT ic.object_id, ic.column_id \
                 FROM sys.index_columns AS ic \
                 INNER JOIN sys.indexes AS i ON i.object_id = ic.object_id AND i.index_id = ic.index_id \
                 WHERE i.is_primary_key = 1 \
             ) AS pk ON pk.object_id = c.object_id AND pk.column_id = c.column_id \
             WHERE c.object_id = OBJECT_ID(?) \
             ORDER BY c.column_id",
            vec![table.into()],
        )
    }

    fn create_table(
        &self,
        definition: &TableDefinition,
        _names: &Identifiers,
    ) -> Result<Statement> {
        let columns = definition.columns()?;

        let mut declare = String::from(
            "DECLARE @SQLStatement AS NVARCHAR(MAX);\nDECLARE @TableName SYSNAME = ?;\n",
        );
        let mut params: Vec<Value> = vec![definition.table().into()];
        let mut syntax = Vec::with_capacity(columns.len() + 1);
        let mut key = None;

        for (i, column) in columns.iter().enumerate() {
            declare.push_str(&format!(
                "DECLARE @ColumnName_{i} SYSNAME = ?;\nDECLARE @ColumnType_{i} SYSNAME = ?;\n"
            ));
            params.push(column.name.clone().into());
            params.push(column.sql_type.name().into());

            let mut parts = vec![
                format!("QUOTENAME(@ColumnName_{i})"),
                format!("QUOTENAME(@ColumnType_{i})"),
            ];
            if let Some(size) = column.size() {
                declare.push_str(&format!("DECLARE @ColumnSize_{i} VARCHAR(MAX) = ?;\n"));
                params.push(size.into());
                parts.push(format!("@ColumnSize_{i}"));
            }
            if column.not_null {
                parts.push("'NOT NULL'".to_string());
            }
            if column.is_identity {
                parts.push("'IDENTITY(1,1) PRIMARY KEY'".to_string());
            } else if column.is_primary_key {
                key = Some(i);
            }
            syntax.push(parts.join(" + ' ' + "));
        }
        if let Some(i) = key {
            syntax.push(format!("'PRIMARY KEY (' + QUOTENAME(@ColumnName_{i}) + ')'"));
        }

        let sql = format!(
            "{declare}SET @SQLStatement = N'CREATE TABLE ' + QUOTENAME(@TableName) + ' (' +\n{}\n+ ');';\n\
             EXEC sp_executesql @SQLStatement;",
            syntax.join(" + ', ' +\n")
        );
        Ok(Statement::with_params(sql, params))
    }

    fn add_column(
        &self,
        table: &str,
        column: &ColumnSpec,
        names: &Identifiers,
    ) -> Result<Statement> {
        Ok(Statement::new(format!(
            "ALTER TABLE {} ADD {} {} NULL",
            names.get(table)?,
            names.get(&column.name)?,
            column.sql_type
        )))
    }

    fn alter_column(
        &self,
        schema: &Schema,
        column: &ColumnSpec,
        names: &Identifiers,
    ) -> Result<Vec<Statement>> {
        let nullability = if column.not_null { "NOT NULL" } else { "NULL" };
        Ok(vec![Statement::new(format!(
            "ALTER TABLE {} ALTER COLUMN {} {} {nullability}",
            names.get(schema.table())?,
            names.get(&column.name)?,
            column.sql_type
        ))])
    }

    fn scratch_table(&self, table: &str) -> String {
        format!("##tabsql_infer_{table}")
    }

    fn source_table(&self, table: &str) -> String {
        format!("#tabsql_source_{table}")
    }

    fn stage_scratch(
        &self,
        scratch: &str,
        width: usize,
        names: &Identifiers,
    ) -> Result<Vec<Statement>> {
        let columns = names
            .all(&self.scratch_columns(width))?
            .into_iter()
            .map(|c| format!("{c} NVARCHAR(MAX)"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "DECLARE @TableName SYSNAME = ?;\n\
             DECLARE @SQLStatement AS NVARCHAR(MAX) = \
             N'DROP TABLE IF EXISTS ' + QUOTENAME(@TableName) + N'; \
             CREATE TABLE ' + QUOTENAME(@TableName) + N' ({})';\n\
             EXEC sp_executesql @SQLStatement;",
            Self::literal(&columns)
        );
        Ok(vec![Statement::with_params(sql, vec![scratch.into()])])
    }

    fn infer_probe(
        &self,
        scratch: &str,
        columns: &[String],
        names: &Identifiers,
    ) -> Result<Statement> {
        let staged = names.all(&self.scratch_columns(columns.len()))?;
        let values = staged
            .iter()
            .enumerate()
            .map(|(i, c)| format!("(@ColumnName_{i}, {c})"))
            .collect::<Vec<_>>()
            .join(", ");
        let body = format!(
            "SELECT ColumnName AS column_name, {} AS type_name, MAX(LEN(ColumnValue)) AS max_len FROM ",
            Self::probe_case()
        );
        let tail = format!(
            " CROSS APPLY (VALUES {values}) AS _sample(ColumnName, ColumnValue) \
             WHERE ColumnValue IS NOT NULL GROUP BY ColumnName"
        );
        let declarations = (0..columns.len())
            .map(|i| format!("@ColumnName_{i} SYSNAME"))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = (0..columns.len())
            .map(|i| format!("@ColumnName_{i} = ?"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "DECLARE @TableName SYSNAME = ?;\n\
             DECLARE @SQLStatement AS NVARCHAR(MAX) = N'{}' + QUOTENAME(@TableName) + N'{}';\n\
             EXEC sp_executesql @SQLStatement, N'{declarations}', {assignments};",
            Self::literal(&body),
            Self::literal(&tail),
        );
        let mut params: Vec<Value> = vec![scratch.into()];
        params.extend(columns.iter().cloned().map(Value::from));
        Ok(Statement::with_params(sql, params))
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
        // the UNION ALL keeps SELECT INTO from copying the IDENTITY property
        Ok(vec![
            Statement::new(format!("DROP TABLE IF EXISTS {source}")),
            Statement::new(format!(
                "SELECT TOP 0 {columns} INTO {source} FROM {target} \
                 UNION ALL SELECT TOP 0 {columns} FROM {target}"
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
        let target = names.get(plan.target)?;
        let source = names.get(plan.source)?;
        let columns = names.all(plan.columns)?;
        let matches = names.all(plan.match_columns)?;
        let updates = names.all(&plan.update_columns())?;

        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if !updates.is_empty() {
            let mut assignments: Vec<String> = updates
                .iter()
                .map(|c| format!("_target.{c} = _source.{c}"))
                .collect();
            if let Some(column) = plan.time_update {
                assignments.push(format!("_target.{} = ?", names.get(column)?));
                params.push(plan.timestamp.clone());
            }
            clauses.push(format!(
                "WHEN MATCHED AND EXISTS (SELECT {} EXCEPT SELECT {}) THEN\n    UPDATE SET {}",
                qualified("_source", &updates),
                qualified("_target", &updates),
                assignments.join(", ")
            ));
        }

        if plan.mode != MergeMode::Update {
            let mut insert_columns = columns.clone();
            let mut values = qualified("_source", &columns);
            if let Some(column) = plan.time_insert {
                insert_columns.push(names.get(column)?.to_string());
                values.push_str(", ?");
                params.push(plan.timestamp.clone());
            }
            clauses.push(format!(
                "WHEN NOT MATCHED BY TARGET THEN\n    INSERT ({}) VALUES ({values})",
                insert_columns.join(", ")
            ));
        }

        if plan.mode == MergeMode::Merge {
            let mut clause = String::from("WHEN NOT MATCHED BY SOURCE");
            for column in names.all(plan.subset_columns)? {
                clause.push_str(&format!(
                    " AND _target.{column} IN (SELECT _subset.{column} FROM {source} AS _subset)"
                ));
            }
            clause.push_str(" THEN\n    DELETE");
            clauses.push(clause);
        }

        if clauses.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::new();
        if plan.identity_insert {
            sql.push_str(&format!("SET IDENTITY_INSERT {target} ON;\n"));
        }
        sql.push_str(&format!(
            "MERGE {target} AS _target\nUSING {source} AS _source\nON {}\n{};\n",
            join_equal("_target", "_source", &matches),
            clauses.join("\n")
        ));
        if plan.identity_insert {
            sql.push_str(&format!("SET IDENTITY_INSERT {target} OFF;\n"));
        }
        Ok(vec![Statement::with_params(sql, params)])
    }

    fn select(&self, plan: &SelectPlan<'_>, names: &Identifiers) -> Result<Statement> {
        let mut sql = String::from("SELECT ");
        if let Some(limit) = plan.limit {
            sql.push_str(&format!("TOP ({limit}) "));
        }
        if plan.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&names.all(plan.columns)?.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(names.get(plan.table)?);

        let mut params = Vec::new();
        if let Some((predicate, args)) = &plan.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
            params.extend(args.iter().cloned());
        }
        if let Some((column, order)) = plan.order_by {
            sql.push_str(&format!(" ORDER BY {} {}", names.get(column)?, order.as_sql()));
        }
        Ok(Statement::with_params(sql, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Size, SqlType};

    fn names(raw: &[&str]) -> Identifiers {
        let raw: Vec<String> = raw.iter().map(ToString::to_string).collect();
        let quoted = raw.iter().map(|r| format!("[{r}]")).collect();
        Identifiers::new(&raw, quoted)
    }

    #[test]
    fn sanitize_uses_quotename() {
        let statement = TsqlDialect::new().sanitize(&["a".to_string(), "b]".to_string()]);
        assert_eq!(
            statement.sql,
            "SELECT QUOTENAME(NULLIF(?, '')), QUOTENAME(NULLIF(?, ''))"
        );
        assert_eq!(statement.params, vec![Value::from("a"), Value::from("b]")]);
    }

    #[test]
    fn unquote_brackets() {
        let dialect = TsqlDialect::new();
        assert_eq!(dialect.unquote("[a]]b]").as_deref(), Some("a]b"));
        assert_eq!(dialect.unquote("[a]b]"), None);
        assert_eq!(dialect.unquote("a"), None);
    }

    #[test]
    fn create_table_binds_names_types_and_sizes() {
        let definition = TableDefinition::new("My Table")
            .column("Name]; DROP TABLE x;--", SqlType::Varchar(Size::Chars(10)))
            .column("n", SqlType::Int)
            .not_null(["n"])
            .primary_key("n");
        let statement = TsqlDialect::new()
            .create_table(&definition, &Identifiers::default())
            .unwrap();

        assert!(!statement.sql.contains("My Table"));
        assert!(!statement.sql.contains("DROP TABLE x"));
        assert!(statement.sql.contains("EXEC sp_executesql @SQLStatement;"));
        assert!(statement.sql.contains(
            "QUOTENAME(@ColumnName_0) + ' ' + QUOTENAME(@ColumnType_0) + ' ' + @ColumnSize_0"
        ));
        assert!(statement.sql.contains("'PRIMARY KEY (' + QUOTENAME(@ColumnName_1) + ')'"));
        assert_eq!(
            statement.params,
            vec![
                Value::from("My Table"),
                Value::from("Name]; DROP TABLE x;--"),
                Value::from("varchar"),
                Value::from("(10)"),
                Value::from("n"),
                Value::from("int"),
            ]
        );
    }

    #[test]
    fn create_table_identity() {
        let definition = TableDefinition::new("t")
            .column("a", SqlType::Float)
            .identity("_pk");
        let statement = TsqlDialect::new()
            .create_table(&definition, &Identifiers::default())
            .unwrap();
        assert!(statement.sql.contains(
            "QUOTENAME(@ColumnName_0) + ' ' + QUOTENAME(@ColumnType_0) + ' ' + 'NOT NULL' + ' ' + 'IDENTITY(1,1) PRIMARY KEY'"
        ));
        assert_eq!(statement.params[1], Value::from("_pk"));
    }

    #[test]
    fn probe_binds_column_names_into_dynamic_sql() {
        let columns = vec!["Col A".to_string(), "b".to_string()];
        let statement = TsqlDialect::new()
            .infer_probe("##tabsql_infer_t", &columns, &names(&["c0", "c1"]))
            .unwrap();
        assert!(statement.sql.contains("TRY_CONVERT(TINYINT, ColumnValue)"));
        assert!(statement.sql.contains("IN (''0'', ''1'')"));
        assert!(statement.sql.contains(
            "N'@ColumnName_0 SYSNAME, @ColumnName_1 SYSNAME', @ColumnName_0 = ?, @ColumnName_1 = ?;"
        ));
        assert!(!statement.sql.contains("Col A"));
        assert_eq!(statement.params.len(), 3);
    }

    #[test]
    fn merge_is_one_statement_with_delete_branch() {
        let columns = vec!["_pk".to_string(), "a".to_string()];
        let matches = vec!["_pk".to_string()];
        let subset = vec!["a".to_string()];
        let plan = MergePlan {
            target: "t",
            source: "#s",
            columns: &columns,
            match_columns: &matches,
            subset_columns: &subset,
            mode: MergeMode::Merge,
            time_insert: Some("_time_insert"),
            time_update: Some("_time_update"),
            timestamp: Value::from("2024-01-01"),
            identity_insert: true,
        };
        let statements = TsqlDialect::new()
            .merge(&plan, &names(&["t", "#s", "_pk", "a", "_time_insert", "_time_update"]))
            .unwrap();

        assert_eq!(statements.len(), 1);
        let sql = &statements[0].sql;
        assert!(sql.starts_with(
            "SET IDENTITY_INSERT [t] ON;\nMERGE [t] AS _target\nUSING [#s] AS _source\n\
             ON _target.[_pk] = _source.[_pk]\n"
        ));
        assert!(sql.contains(
            "WHEN MATCHED AND EXISTS (SELECT _source.[a] EXCEPT SELECT _target.[a]) THEN"
        ));
        assert!(sql.contains(
            "INSERT ([_pk], [a], [_time_insert]) VALUES (_source.[_pk], _source.[a], ?)"
        ));
        assert!(sql.contains(
            "WHEN NOT MATCHED BY SOURCE AND _target.[a] IN (SELECT _subset.[a] FROM [#s] AS _subset) THEN\n    DELETE;"
        ));
        assert!(sql.ends_with("SET IDENTITY_INSERT [t] OFF;\n"));
        assert_eq!(statements[0].params.len(), 2);
    }

    #[test]
    fn select_uses_top() {
        let plan = SelectPlan {
            table: "t",
            columns: &[],
            predicate: None,
            order_by: None,
            limit: Some(5),
        };
        let statement = TsqlDialect::new().select(&plan, &names(&["t"])).unwrap();
        assert_eq!(statement.sql, "SELECT TOP (5) * FROM [t]");
    }
}
