//! End-to-end properties of the differ, the generators and change replay.

use oxide_schema::prelude::*;
use pretty_assertions::assert_eq;

fn blog_v1() -> Schema {
    Schema::new()
        .named("blog")
        .table(
            Table::new("users")
                .field(Field::new("id", "uuid").primary_key().default("gen_random_uuid()"))
                .field(Field::new("email", "varchar(255)").unique().not_null())
                .field(Field::new("legacy_flag", "boolean").default("false")),
        )
        .table(
            Table::new("posts")
                .field(Field::new("id", "uuid").primary_key())
                .field(Field::new("author_id", "uuid").not_null())
                .field(Field::new("title", "text"))
                .index(Index::new("", ["title"])),
        )
        .table(Table::new("audit").field(Field::new("id", "bigserial").primary_key()))
        .reference(
            Reference::new("posts", "author_id", "users", "id")
                .on_delete(ReferentialAction::Cascade),
        )
}

fn blog_v2() -> Schema {
    Schema::new()
        .named("blog")
        .table(
            Table::new("users")
                .field(Field::new("id", "uuid").primary_key().default("gen_random_uuid()"))
                .field(Field::new("email", "varchar(320)").not_null())
                .field(Field::new("name", "varchar(100)").not_null())
                .field(
                    Field::new("created_at", "timestamp")
                        .not_null()
                        .default("now()"),
                ),
        )
        .table(
            Table::new("posts")
                .field(Field::new("id", "uuid").primary_key())
                .field(Field::new("author_id", "uuid").not_null())
                .field(Field::new("title", "text").not_null())
                .field(Field::new("editor_id", "uuid")),
        )
        .table(
            Table::new("comments")
                .field(Field::new("id", "uuid").primary_key())
                .field(Field::new("post_id", "uuid").not_null())
                .field(Field::new("body", "text")),
        )
        .index(Index::new("posts", ["title", "author_id"]).unique())
        .reference(Reference::new("posts", "author_id", "users", "id"))
        .reference(Reference::new("posts", "editor_id", "users", "id"))
        .reference(
            Reference::new("comments", "post_id", "posts", "id")
                .on_delete(ReferentialAction::Cascade),
        )
}

fn postgres() -> Box<dyn SqlGenerator> {
    generator_for(Dialect::Postgres, ExtensionRegistry::empty()).unwrap()
}

#[test]
fn identical_schemas_produce_no_changes() {
    let generator = postgres();
    let differ = Differ::new(generator.as_ref());

    for schema in [Schema::new(), blog_v1(), blog_v2()] {
        assert!(differ.compare(&schema, &schema).is_empty());
    }
}

#[test]
fn replayed_changes_converge() {
    let generator = postgres();
    let differ = Differ::new(generator.as_ref());

    for (from, to) in [
        (Schema::new(), blog_v1()),
        (blog_v1(), blog_v2()),
        (blog_v2(), blog_v1()),
        (blog_v2(), Schema::new()),
    ] {
        let changes = differ.compare(&from, &to);
        assert!(!changes.is_empty());

        let mut state = SchemaState::from_schema(from);
        state.apply_all(&changes).unwrap();
        assert_eq!(differ.compare(state.schema(), &to), Vec::<Change>::new());
    }
}

#[test]
fn output_is_deterministic() {
    let generator = postgres();
    let differ = Differ::new(generator.as_ref());

    let first = generator.render_changes(&differ.compare(&blog_v1(), &blog_v2()));
    for _ in 0..10 {
        let again = generator.render_changes(&differ.compare(&blog_v1(), &blog_v2()));
        assert_eq!(first, again);
    }
}

#[test]
fn input_declaration_order_does_not_change_the_diff() {
    let generator = postgres();
    let differ = Differ::new(generator.as_ref());

    let mut shuffled = blog_v1();
    shuffled.tables.reverse();
    for table in &mut shuffled.tables {
        table.fields.reverse();
    }

    assert!(differ.compare(&blog_v1(), &shuffled).is_empty());
}

#[test]
fn changes_follow_execution_phases() {
    let generator = postgres();
    let changes = Differ::new(generator.as_ref()).compare(&blog_v1(), &blog_v2());

    let phases: Vec<ChangePhase> = changes.iter().map(Change::phase).collect();
    let mut sorted = phases.clone();
    sorted.sort();
    assert_eq!(phases, sorted);

    let last_drop_fk = phases
        .iter()
        .rposition(|p| *p == ChangePhase::DropForeignKey);
    let first_create_table = phases.iter().position(|p| *p == ChangePhase::CreateTable);
    assert!(last_drop_fk < first_create_table);

    let last_alter = phases.iter().rposition(|p| *p == ChangePhase::AlterTable);
    let first_add_fk = phases.iter().position(|p| *p == ChangePhase::AddForeignKey);
    assert!(last_alter < first_add_fk);
}

#[test]
fn blog_upgrade_renders_expected_sql() {
    let generator = postgres();
    let changes = Differ::new(generator.as_ref()).compare(&blog_v1(), &blog_v2());

    let expected = "\
-- Drop index 'idx_posts_title' from table 'posts'
DROP INDEX IF EXISTS idx_posts_title;

-- Drop table 'audit'
DROP TABLE IF EXISTS audit;

-- Create table 'comments'
CREATE TABLE comments (
    id UUID PRIMARY KEY,
    post_id UUID NOT NULL,
    body TEXT
);

-- Add column 'name' to table 'users'
ALTER TABLE users ADD COLUMN name VARCHAR(100) NOT NULL;

-- Add column 'created_at' to table 'users'
ALTER TABLE users ADD COLUMN created_at TIMESTAMP NOT NULL DEFAULT now();

-- Drop column 'legacy_flag' from table 'users'
ALTER TABLE users DROP COLUMN IF EXISTS legacy_flag;

-- Change type of column 'email' in table 'users' from 'varchar(255)' to 'varchar(320)'
ALTER TABLE users ALTER COLUMN email TYPE VARCHAR(320);

-- Drop unique constraint 'uk_users_email' from table 'users'
ALTER TABLE users DROP CONSTRAINT IF EXISTS uk_users_email;

-- Add column 'editor_id' to table 'posts'
ALTER TABLE posts ADD COLUMN editor_id UUID;

-- Set NOT NULL on column 'title' in table 'posts'
ALTER TABLE posts ALTER COLUMN title SET NOT NULL;

-- Create index 'idx_posts_title_author_id' on table 'posts'
CREATE UNIQUE INDEX idx_posts_title_author_id ON posts (title, author_id);

-- Add foreign key 'fk_posts_editor_id' to table 'posts'
ALTER TABLE posts ADD CONSTRAINT fk_posts_editor_id FOREIGN KEY (editor_id) REFERENCES users (id);

-- Add foreign key 'fk_comments_post_id' to table 'comments'
ALTER TABLE comments ADD CONSTRAINT fk_comments_post_id FOREIGN KEY (post_id) REFERENCES posts (id) ON DELETE CASCADE;
";

    assert_eq!(generator.render_changes(&changes), expected);
}

#[test]
fn rendered_schema_round_trips_through_the_model() {
    let generator = postgres();
    let schema = blog_v2();

    let sql = generator.render_schema(&schema).unwrap();
    assert!(sql.contains("CREATE TABLE users ("));

    let json = serde_json::to_string(&schema).unwrap();
    let reparsed: Schema = serde_json::from_str(&json).unwrap();
    assert!(Differ::new(generator.as_ref())
        .compare(&schema, &reparsed)
        .is_empty());
    assert_eq!(generator.render_schema(&reparsed).unwrap(), sql);
}

#[test]
fn sqlite_renders_unsupported_changes_as_comments() {
    let generator = generator_for(Dialect::Sqlite, ExtensionRegistry::empty()).unwrap();
    let changes = Differ::new(generator.as_ref()).compare(&blog_v1(), &blog_v2());
    let sql = generator.render_changes(&changes);

    assert!(sql.contains("-- ALTER COLUMN TYPE is not supported by SQLite"));
    assert!(sql.contains("DROP INDEX IF EXISTS uk_users_email;"));
    assert!(sql.contains("ALTER TABLE users DROP COLUMN legacy_flag;"));
    assert!(!sql.contains("SET NOT NULL;"));
}
