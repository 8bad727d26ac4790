//! One-call helpers over [`Table`]
//!
//! Each helper builds its table right away, so log lines point at the
//! helper's caller, and returns the future of the terminal operation.

use std::future::Future;

use crate::error::Result;
use crate::table::Table;
use crate::traits::{Bind, Driver, ExecuteResult, Record, ToValue};
use crate::value::Value;

/// Rows of `table` matching `template`.
#[track_caller]
pub fn count_where<'a>(
    driver: &'a dyn Driver,
    table: &str,
    template: &str,
    args: &[Value],
) -> impl Future<Output = Result<u64>> + 'a {
    Table::new(driver, table)
        .set_where_args(template, args)
        .count()
}

/// The row whose `id` column equals `id`.
#[track_caller]
pub fn find_by_id<'a, B: Bind>(
    driver: &'a dyn Driver,
    table: &str,
    id: impl ToValue,
) -> impl Future<Output = Result<B>> + 'a {
    Table::new(driver, table).set_where("id", id).find_one()
}

#[track_caller]
pub fn find_one_where<'a, B: Bind>(
    driver: &'a dyn Driver,
    table: &str,
    template: &str,
    args: &[Value],
) -> impl Future<Output = Result<B>> + 'a {
    Table::new(driver, table)
        .set_where_args(template, args)
        .find_one()
}

#[track_caller]
pub fn find_all_where<'a, B: Bind>(
    driver: &'a dyn Driver,
    table: &str,
    template: &str,
    args: &[Value],
) -> impl Future<Output = Result<Vec<B>>> + 'a {
    Table::new(driver, table)
        .set_where_args(template, args)
        .find_all()
}

#[track_caller]
pub fn insert_obj<'a, R: Record>(
    driver: &'a dyn Driver,
    table: &str,
    record: &'a R,
) -> impl Future<Output = Result<ExecuteResult>> + 'a {
    Table::new(driver, table).insert_one(record)
}

#[track_caller]
pub fn insert_objs<'a, R: Record>(
    driver: &'a dyn Driver,
    table: &str,
    records: &'a [R],
) -> impl Future<Output = Result<ExecuteResult>> + 'a {
    Table::new(driver, table).insert(records)
}

/// Update the rows matching `template` with the columns of `record`.
#[track_caller]
pub fn update_obj_where<'a, R: Record>(
    driver: &'a dyn Driver,
    table: &str,
    record: &'a R,
    template: &str,
    args: &[Value],
) -> impl Future<Output = Result<ExecuteResult>> + 'a {
    Table::new(driver, table)
        .set_where_args(template, args)
        .update(record)
}

#[track_caller]
pub fn delete_obj<'a, R: Record>(
    driver: &'a dyn Driver,
    table: &str,
    record: &'a R,
) -> impl Future<Output = Result<ExecuteResult>> + 'a {
    Table::new(driver, table).delete(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::tests::catalog_rows;
    use crate::testing::MockDriver;
    use crate::traits::{ColumnInfo, Rows};
    use crate::{params, Record};

    #[derive(Debug, Default, Record)]
    struct Item {
        #[dbkit(json = "id")]
        pub id: u32,
        #[dbkit(json = "title")]
        pub title: String,
    }

    fn driver() -> MockDriver {
        MockDriver::new()
            .on(
                "SHOW COLUMNS",
                catalog_rows(&[
                    ("id", "int unsigned", "NO", "PRI", None, "auto_increment"),
                    ("title", "varchar(20)", "NO", "", None, ""),
                ]),
            )
            .on("COUNT(*)", Rows::new(vec![ColumnInfo::new("n")], vec![vec![Value::I64(2)]]))
            .on(
                "FROM `items_h`",
                Rows::new(
                    vec![ColumnInfo::new("id"), ColumnInfo::new("title")],
                    vec![vec![Value::U32(3), Value::from("pen")]],
                ),
            )
    }

    #[tokio::test]
    async fn test_reads() {
        let d = driver();
        assert_eq!(count_where(&d, "items_h", "id > ?", params![1]).await.unwrap(), 2);
        assert_eq!(d.last(), "SELECT COUNT(*) FROM `items_h` WHERE id > 1;");

        let item: Item = find_by_id(&d, "items_h", 3).await.unwrap();
        assert_eq!(item.title, "pen");
        assert_eq!(
            d.last(),
            "SELECT `id`, `title` FROM `items_h` WHERE id = 3 LIMIT 1 OFFSET 0;"
        );

        let items: Vec<Item> = find_all_where(&d, "items_h", "title = ?", params!["pen"])
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        let one: Item = find_one_where(&d, "items_h", "title LIKE ?", params!["p%"])
            .await
            .unwrap();
        assert_eq!(one.id, 3);
    }

    #[tokio::test]
    async fn test_writes() {
        let d = driver();
        let item = Item {
            id: 0,
            title: "cup".into(),
        };
        insert_obj(&d, "items_h", &item).await.unwrap();
        assert_eq!(d.last(), r#"INSERT INTO `items_h` (`title`) VALUES ("cup");"#);

        insert_objs(&d, "items_h", std::slice::from_ref(&item))
            .await
            .unwrap();
        update_obj_where(&d, "items_h", &item, "title = ?", params!["mug"])
            .await
            .unwrap();
        assert_eq!(
            d.last(),
            r#"UPDATE `items_h` SET `title` = "cup" WHERE title = "mug";"#
        );

        delete_obj(&d, "items_h", &Item { id: 5, title: "x".into() })
            .await
            .unwrap();
        assert_eq!(
            d.last(),
            r#"DELETE FROM `items_h` WHERE `id` = 5 AND `title` = "x";"#
        );
    }
}
