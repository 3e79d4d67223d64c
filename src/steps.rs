//! Step table and cucumber registration.
//!
//! Every pattern is registered for `Given`, `When` and `Then`. Handlers run the matching
//! [`Manager`](crate::Manager) operation and fail the step by panicking with the error text.

use cucumber::{
    Cucumber, Parser, World, Writer,
    event::ScenarioFinished,
    gherkin,
    runner::{self, ScenarioType},
    step::{Context, Step},
};
use futures::{FutureExt, future::LocalBoxFuture};
use log::{trace, warn};
use regex::Regex;

use crate::{
    context::MongoWorld,
    error::{StepError, StepResult},
    manager::DEFAULT_DATABASE,
};

/// One entry of the step table.
pub struct StepDefinition<W> {
    pub pattern: &'static str,
    pub handler: Step<W>,
    regex: Regex,
}

impl<W> StepDefinition<W> {
    fn new(pattern: &'static str, handler: Step<W>) -> Self {
        Self {
            pattern,
            handler,
            regex: Regex::new(pattern).expect("step patterns are valid regular expressions"),
        }
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl<W> std::fmt::Debug for StepDefinition<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition").field("pattern", &self.pattern).finish()
    }
}

/// The full step vocabulary.
pub fn step_definitions<W: MongoWorld>() -> Vec<StepDefinition<W>> {
    vec![
        // Setup
        StepDefinition::new(r#"no (?:docs|documents) in collection "(?P<collection>[^"]*)"$"#, truncate::<W>),
        StepDefinition::new(
            r#"these (?:docs|documents) are(?: stored)? in collection "(?P<collection>[^"]*)"[:]?$"#,
            seed::<W>,
        ),
        StepDefinition::new(
            r#"(?:docs|documents) from(?: file)? "(?P<path>[^"]*)" are(?: stored)? in collection "(?P<collection>[^"]*)"$"#,
            seed_from_file::<W>,
        ),
        StepDefinition::new(r#"(?:search|find) in collection "(?P<collection>[^"]*)"$"#, search_all::<W>),
        StepDefinition::new(
            r#"(?:search|find) in collection "(?P<collection>[^"]*)" with query[:]?$"#,
            search_with_query::<W>,
        ),
        StepDefinition::new(
            r#"no (?:docs|documents) in collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)"$"#,
            truncate::<W>,
        ),
        StepDefinition::new(
            r#"these (?:docs|documents) are(?: stored)? in collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)"[:]?$"#,
            seed::<W>,
        ),
        StepDefinition::new(
            r#"(?:docs|documents) from(?: file)? "(?P<path>[^"]*)" are(?: stored)? in collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)"[:]?$"#,
            seed_from_file::<W>,
        ),
        StepDefinition::new(
            r#"(?:search|find) in collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)" with query[:]?$"#,
            search_with_query::<W>,
        ),
        StepDefinition::new(
            r#"(?:search|find) in collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)"$"#,
            search_all::<W>,
        ),
        // Collection assertions
        StepDefinition::new(
            r#"no (?:docs|documents) are(?: available)? in collection "(?P<collection>[^"]*)"$"#,
            assert_no_documents::<W>,
        ),
        StepDefinition::new(
            r#"there (?:is|are) (?P<count>[0-9]+) (?:doc|docs|document|documents)(?: available)? in collection "(?P<collection>[^"]*)"$"#,
            assert_count::<W>,
        ),
        StepDefinition::new(
            r#"collection "(?P<collection>[^"]*)" should have (?P<count>[0-9]+) (?:doc|docs|document|documents)(?: available)?$"#,
            assert_count::<W>,
        ),
        StepDefinition::new(
            r#"there (?:is|are) only (?:this|these) (?:doc|docs|document|documents)(?: available)? in collection "(?P<collection>[^"]*)"[:]?$"#,
            assert_only::<W>,
        ),
        StepDefinition::new(
            r#"collection "(?P<collection>[^"]*)" should have only (?:this|these) (?:doc|docs|document|documents)(?: available)?[:]?$"#,
            assert_only::<W>,
        ),
        StepDefinition::new(
            r#"there (?:is|are) only (?:this|these) (?:doc|docs|document|documents) from(?: file)? "(?P<path>[^"]*)"(?: available)? in collection "(?P<collection>[^"]*)"[:]?$"#,
            assert_only_from_file::<W>,
        ),
        StepDefinition::new(
            r#"no (?:docs|documents) are(?: available)? in collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)"$"#,
            assert_no_documents::<W>,
        ),
        StepDefinition::new(
            r#"there (?:is|are) (?P<count>[0-9]+) (?:doc|docs|document|documents)(?: available)? in collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)"$"#,
            assert_count::<W>,
        ),
        StepDefinition::new(
            r#"there (?:is|are) only (?:this|these) (?:doc|docs|document|documents)(?: available)? in collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)"[:]?$"#,
            assert_only::<W>,
        ),
        StepDefinition::new(
            r#"collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)" should have only (?:this|these) (?:doc|docs|document|documents)(?: available)?[:]?$"#,
            assert_only::<W>,
        ),
        StepDefinition::new(
            r#"there (?:is|are) only (?:this|these) (?:doc|docs|document|documents) from(?: file)? "(?P<path>[^"]*)"(?: available)? in collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)"[:]?$"#,
            assert_only_from_file::<W>,
        ),
        StepDefinition::new(
            r#"collection "(?P<collection>[^"]*)" of database "(?P<database>[^"]*)" should have (?P<count>[0-9]+) (?:doc|docs|document|documents)(?: available)?$"#,
            assert_count::<W>,
        ),
        // Search result assertions
        StepDefinition::new(
            r"found (?P<count>[0-9]+) (?:doc|docs|document|documents) in the result$",
            assert_result_count::<W>,
        ),
        StepDefinition::new(
            r"there (?:is|are) (?P<count>[0-9]+) (?:doc|docs|document|documents) in the result$",
            assert_result_count::<W>,
        ),
        StepDefinition::new(
            r"found (?:this|these) (?:doc|docs|document|documents) in the result[:]?$",
            assert_result::<W>,
        ),
        StepDefinition::new(
            r"(?:this|these) (?:doc|docs|document|documents) (?:is|are) in the result[:]?$",
            assert_result::<W>,
        ),
    ]
}

/// Registers the mongo step table on a [`Cucumber`] builder.
pub trait MongoSteps {
    fn mongo_steps(self) -> Self;
}

impl<W, I, P, Wr, F, B, A, Cli> MongoSteps for Cucumber<W, P, I, runner::Basic<W, F, B, A>, Wr, Cli>
where
    W: World + MongoWorld,
    P: Parser<I>,
    Wr: Writer<W>,
    Cli: clap::Args,
    F: Fn(&gherkin::Feature, Option<&gherkin::Rule>, &gherkin::Scenario) -> ScenarioType + 'static,
    B: for<'a> Fn(
            &'a gherkin::Feature,
            Option<&'a gherkin::Rule>,
            &'a gherkin::Scenario,
            &'a mut W,
        ) -> LocalBoxFuture<'a, ()>
        + 'static,
    A: for<'a> Fn(
            &'a gherkin::Feature,
            Option<&'a gherkin::Rule>,
            &'a gherkin::Scenario,
            &'a ScenarioFinished,
            Option<&'a mut W>,
        ) -> LocalBoxFuture<'a, ()>
        + 'static,
{
    fn mongo_steps(self) -> Self {
        step_definitions::<W>().into_iter().fold(self, |cucumber, def| {
            cucumber
                .given(def.regex.clone(), def.handler)
                .when(def.regex.clone(), def.handler)
                .then(def.regex, def.handler)
        })
    }
}

/// After-scenario hook truncating every registered clean-up collection.
///
/// Install it with `.after(clean_up_after_scenario)`. A failed clean-up fails the scenario.
pub fn clean_up_after_scenario<'a, W: MongoWorld>(
    _: &'a gherkin::Feature,
    _: Option<&'a gherkin::Rule>,
    scenario: &'a gherkin::Scenario,
    _: &'a ScenarioFinished,
    world: Option<&'a mut W>,
) -> LocalBoxFuture<'a, ()> {
    clean_up_world(world, &scenario.name).boxed_local()
}

async fn clean_up_world<W: MongoWorld>(world: Option<&mut W>, scenario: &str) {
    let Some(world) = world else {
        warn!(scenario = scenario; "No world available, skipping mongo clean up");
        return;
    };

    let manager = world.mongo().manager().clone();
    if let Err(err) = manager.clean_up().await {
        report(&err);
    }
}

/// Arguments captured from the step text.
struct StepArgs<'a> {
    ctx: &'a Context,
}

impl<'a> StepArgs<'a> {
    fn new(ctx: &'a Context) -> Self {
        trace!(step = ctx.step.value.as_str(); "Dispatching mongo step");
        Self { ctx }
    }

    fn named(&self, name: &str) -> Option<&'a str> {
        self.ctx
            .matches
            .iter()
            .find(|(group, _)| group.as_deref() == Some(name))
            .map(|(_, value)| value.as_str())
    }

    fn collection(&self) -> &'a str {
        self.named("collection").unwrap_or_default()
    }

    fn database(&self) -> &'a str {
        self.named("database").unwrap_or(DEFAULT_DATABASE)
    }

    fn path(&self) -> &'a str {
        self.named("path").unwrap_or_default()
    }

    fn count<T: std::str::FromStr>(&self) -> StepResult<T> {
        let raw = self.named("count").unwrap_or_default();
        raw.parse()
            .map_err(|_| StepError::InvalidArgument(format!("{raw:?} is not a valid document count")))
    }

    fn docstring(&self) -> Option<&'a str> {
        self.ctx.step.docstring.as_deref()
    }
}

fn report(err: &StepError) -> ! {
    warn!(error:% = err; "Mongo step failed");
    panic!("{err}");
}

fn finish(result: StepResult<()>) {
    if let Err(err) = result {
        report(&err);
    }
}

fn truncate<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        let manager = world.mongo().manager().clone();
        finish(manager.truncate_collection(args.collection(), args.database()).await);
    }
    .boxed_local()
}

fn seed<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        let manager = world.mongo().manager().clone();
        finish(
            manager
                .store_documents(args.collection(), args.database(), args.docstring())
                .await,
        );
    }
    .boxed_local()
}

fn seed_from_file<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        let manager = world.mongo().manager().clone();
        finish(
            manager
                .store_documents_from_file(args.path(), args.collection(), args.database())
                .await,
        );
    }
    .boxed_local()
}

fn search_all<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        search(world, args.collection(), args.database(), None).await;
    }
    .boxed_local()
}

fn search_with_query<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        search(world, args.collection(), args.database(), args.docstring()).await;
    }
    .boxed_local()
}

async fn search<W: MongoWorld>(world: &mut W, collection: &str, database: &str, filter: Option<&str>) {
    let mongo = world.mongo();
    let manager = mongo.manager().clone();
    match manager.search(collection, database, filter).await {
        Ok(docs) => mongo.set_search_result(docs),
        Err(err) => report(&err),
    }
}

fn assert_no_documents<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        let manager = world.mongo().manager().clone();
        finish(manager.assert_no_documents(args.collection(), args.database()).await);
    }
    .boxed_local()
}

fn assert_count<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        let manager = world.mongo().manager().clone();
        let result = match args.count() {
            Ok(expected) => {
                manager
                    .assert_document_count(expected, args.collection(), args.database())
                    .await
            },
            Err(err) => Err(err),
        };
        finish(result);
    }
    .boxed_local()
}

fn assert_only<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        let manager = world.mongo().manager().clone();
        finish(
            manager
                .assert_only_documents(args.collection(), args.database(), args.docstring())
                .await,
        );
    }
    .boxed_local()
}

fn assert_only_from_file<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        let manager = world.mongo().manager().clone();
        finish(
            manager
                .assert_only_documents_from_file(args.path(), args.collection(), args.database())
                .await,
        );
    }
    .boxed_local()
}

fn assert_result_count<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        let mongo = world.mongo();
        let result = args
            .count()
            .and_then(|expected| mongo.manager().assert_search_result_count(mongo.search_result(), expected));
        finish(result);
    }
    .boxed_local()
}

fn assert_result<W: MongoWorld>(world: &mut W, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let args = StepArgs::new(&ctx);
        let mongo = world.mongo();
        finish(
            mongo
                .manager()
                .assert_search_result(mongo.search_result(), args.docstring()),
        );
    }
    .boxed_local()
}
