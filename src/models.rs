use crate::schema::{chapters, stories, user_inputs, users};

use chrono::{DateTime, Utc};
use diesel::{
    sql_types::{self},
    types::{FromSql, ToSql},
    Identifiable, Queryable,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three age bands the prompt styling knows how to write for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[sql_type = "sql_types::Text"]
pub enum AgeGroup {
    #[serde(rename = "0-2")]
    Toddler,
    #[serde(rename = "3-5")]
    Preschool,
    #[serde(rename = "6-8")]
    EarlyReader,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Toddler => "0-2",
            AgeGroup::Preschool => "3-5",
            AgeGroup::EarlyReader => "6-8",
        }
    }
}

impl std::fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<DB> ToSql<sql_types::Text, DB> for AgeGroup
where
    DB: diesel::backend::Backend,
    str: ToSql<sql_types::Text, DB>,
{
    fn to_sql<W: std::io::Write>(
        &self,
        out: &mut diesel::serialize::Output<W, DB>,
    ) -> diesel::serialize::Result {
        self.as_str().to_sql(out)
    }
}

impl<DB> FromSql<sql_types::Text, DB> for AgeGroup
where
    DB: diesel::backend::Backend,
    String: FromSql<sql_types::Text, DB>,
{
    fn from_sql(bytes: Option<&DB::RawValue>) -> diesel::deserialize::Result<Self> {
        match String::from_sql(bytes)?.as_str() {
            "0-2" => Ok(AgeGroup::Toddler),
            "3-5" => Ok(AgeGroup::Preschool),
            "6-8" => Ok(AgeGroup::EarlyReader),
            other => Err(format!("Unrecognized age group: {}", other).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[sql_type = "sql_types::Text"]
pub enum Plan {
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "pro")]
    Pro,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<DB> ToSql<sql_types::Text, DB> for Plan
where
    DB: diesel::backend::Backend,
    str: ToSql<sql_types::Text, DB>,
{
    fn to_sql<W: std::io::Write>(
        &self,
        out: &mut diesel::serialize::Output<W, DB>,
    ) -> diesel::serialize::Result {
        self.as_str().to_sql(out)
    }
}

impl<DB> FromSql<sql_types::Text, DB> for Plan
where
    DB: diesel::backend::Backend,
    String: FromSql<sql_types::Text, DB>,
{
    fn from_sql(bytes: Option<&DB::RawValue>) -> diesel::deserialize::Result<Self> {
        match String::from_sql(bytes)?.as_str() {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            other => Err(format!("Unrecognized plan: {}", other).into()),
        }
    }
}

#[derive(Insertable, Debug)]
#[table_name = "user_inputs"]
pub struct NewUserInput {
    pub title: String,
    pub age_group: AgeGroup,
    pub plot: String,
    pub characters: String,
}

/// The raw creative brief. Written once per story attempt, never mutated.
#[derive(Identifiable, Queryable, PartialEq, Debug, Clone, Serialize)]
pub struct UserInput {
    pub id: Uuid,
    pub title: String,
    pub age_group: AgeGroup,
    pub plot: String,
    pub characters: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[table_name = "stories"]
pub struct NewStory {
    pub user_id: String,
    pub user_input_id: Uuid,
    pub chapter_count: i32,
}

#[derive(Identifiable, Queryable, Associations, PartialEq, Debug, Clone, Serialize)]
#[belongs_to(UserInput)]
#[table_name = "stories"]
pub struct Story {
    pub id: Uuid,
    pub user_id: String,
    pub user_input_id: Uuid,
    pub cover_image: Option<String>,
    pub chapter_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[table_name = "chapters"]
pub struct NewChapter {
    pub story_id: Uuid,
    pub user_id: String,
    pub chapter_number: i32,
    pub title: String,
    pub content: String,
    pub image_prompt: String,
}

#[derive(Identifiable, Queryable, Associations, PartialEq, Debug, Clone, Serialize)]
#[belongs_to(Story)]
pub struct Chapter {
    pub id: Uuid,
    pub story_id: Uuid,
    pub user_id: String,
    pub chapter_number: i32,
    pub title: String,
    pub content: String,
    pub image_prompt: String,
    pub created_at: DateTime<Utc>,
}

/// Plan and usage bookkeeping for one account. Rows are created at signup
/// by the auth layer; this service only reads them and flips plan fields.
#[derive(Identifiable, Queryable, PartialEq, Debug, Clone, Serialize)]
#[primary_key(id)]
pub struct User {
    pub id: String,
    pub plan: Plan,
    pub story_count: i32,
    pub upgraded_at: Option<DateTime<Utc>>,
    pub polar_customer_id: Option<String>,
}
