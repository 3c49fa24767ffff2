use crate::memory::{MemoryStore, StoredRecord};
use crate::schema::{Cardinality, ResourceDef, Schema};

pub(crate) fn blog_schema() -> Schema {
    Schema::new()
        .with(
            ResourceDef::new("people")
                .attributes(["name", "email", "updated_at"])
                .has_many("posts", "posts")
                .has_many("comments", "comments")
                .has_one("favorite_post", "posts")
                .filter("name")
                .caching("updated_at"),
        )
        .with(
            ResourceDef::new("posts")
                .attributes(["title", "body", "updated_at"])
                .has_one("author", "people")
                .has_many("comments", "comments")
                .has_many("tags", "tags")
                .filter("title"),
        )
        .with(
            ResourceDef::new("comments")
                .attribute("body")
                .has_one("author", "people")
                .has_one("post", "posts")
                .has_many("tags", "tags")
                .default_sort("id"),
        )
        .with(ResourceDef::new("tags").attribute("name").has_many("posts", "posts"))
        .with(
            ResourceDef::new("pictures")
                .attribute("name")
                .has_one("author", "people")
                .has_polymorphic("imageable", Cardinality::ToOne, ["documents", "products"]),
        )
        .with(
            ResourceDef::new("documents")
                .attribute("name")
                .has_many("pictures", "pictures")
                .has_one("owner", "people"),
        )
        .with(
            ResourceDef::new("products")
                .attribute("name")
                .has_many("pictures", "pictures"),
        )
}

pub(crate) fn blog_store() -> MemoryStore {
    MemoryStore::new(blog_schema())
        .with(
            "people",
            StoredRecord::new("1003")
                .attr("name", "Joe Author")
                .attr("email", "joe@xyz.fake")
                .attr("updated_at", "2026-03-01T10:00:00Z")
                .to_many("posts", "posts", ["10", "12"])
                .to_many("comments", "comments", ["100"])
                .to_one("favorite_post", "posts", "10"),
        )
        .with(
            "people",
            StoredRecord::new("1004")
                .attr("name", "Fred Reader")
                .attr("email", "fred@xyz.fake")
                .attr("updated_at", "2026-03-02T08:30:00Z")
                .to_many("posts", "posts", ["15"])
                .to_many("comments", "comments", ["101", "102"]),
        )
        .with(
            "posts",
            StoredRecord::new("10")
                .attr("title", "JR Solves your serialization woes!")
                .attr("body", "Use JR")
                .attr("updated_at", "2026-02-01T00:00:00Z")
                .to_one("author", "people", "1003")
                .to_many("comments", "comments", ["100", "101"])
                .to_many("tags", "tags", ["5"]),
        )
        .with(
            "posts",
            StoredRecord::new("12")
                .attr("title", "JR How To")
                .attr("body", "Use JR to write API apps")
                .attr("updated_at", "2026-02-03T00:00:00Z")
                .to_one("author", "people", "1003")
                .to_many("comments", "comments", ["102"])
                .to_many("tags", "tags", ["5", "6"]),
        )
        .with(
            "posts",
            StoredRecord::new("15")
                .attr("title", "Update This Later")
                .attr("body", "AAAA")
                .attr("updated_at", "2026-02-05T00:00:00Z")
                .to_one("author", "people", "1004"),
        )
        .with(
            "comments",
            StoredRecord::new("100")
                .attr("body", "First!")
                .to_one("author", "people", "1003")
                .to_one("post", "posts", "10")
                .to_many("tags", "tags", ["5"]),
        )
        .with(
            "comments",
            StoredRecord::new("101")
                .attr("body", "Very nice")
                .to_one("author", "people", "1004")
                .to_one("post", "posts", "10"),
        )
        .with(
            "comments",
            StoredRecord::new("102")
                .attr("body", "Thanks")
                .to_one("author", "people", "1004")
                .to_one("post", "posts", "12")
                .to_many("tags", "tags", ["6"]),
        )
        .with(
            "tags",
            StoredRecord::new("5")
                .attr("name", "short")
                .to_many("posts", "posts", ["10", "12"]),
        )
        .with(
            "tags",
            StoredRecord::new("6")
                .attr("name", "whiny")
                .to_many("posts", "posts", ["12"]),
        )
        .with(
            "pictures",
            StoredRecord::new("1")
                .attr("name", "enterprise_gizmo.jpg")
                .to_one("author", "people", "1003")
                .to_one("imageable", "documents", "1"),
        )
        .with(
            "pictures",
            StoredRecord::new("2")
                .attr("name", "company_brochure.jpg")
                .to_one("imageable", "products", "1"),
        )
        .with(
            "pictures",
            StoredRecord::new("3")
                .attr("name", "mission_statement.jpg")
                .to_one("imageable", "documents", "2"),
        )
        .with(
            "documents",
            StoredRecord::new("1")
                .attr("name", "Company Brochure")
                .to_many("pictures", "pictures", ["1"])
                .to_one("owner", "people", "1003"),
        )
        .with(
            "documents",
            StoredRecord::new("2")
                .attr("name", "Mission Statement")
                .to_many("pictures", "pictures", ["3"]),
        )
        .with(
            "products",
            StoredRecord::new("1")
                .attr("name", "Enterprise Gizmo")
                .to_many("pictures", "pictures", ["2"]),
        )
}
