//! BDD step definitions for aggregated build health

use cucumber::{given, then, when};

use jenkins_monitor::{FetchErrorKind, JobTable};

use crate::common::job;
use crate::world::{parse_status, JenkinsMonitorWorld};

fn listing(world: &JenkinsMonitorWorld) -> JobTable {
    world.listed_jobs.iter().cloned().collect()
}

#[given(expr = "the server lists job {string} as {string}")]
fn server_lists_job(world: &mut JenkinsMonitorWorld, name: String, status: String) {
    let number = world.listed_jobs.len() as u64 + 1;
    world
        .listed_jobs
        .push(job(&name, number, parse_status(&status)));
    let jobs = listing(world);
    world.source.set_jobs(Ok(jobs));
}

#[given(expr = "the favorites are {string}")]
fn favorites_are(world: &mut JenkinsMonitorWorld, favorites: String) {
    world.favorites = favorites
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
}

#[given(expr = "the health goes stale after {int} failed polls")]
fn stale_after(world: &mut JenkinsMonitorWorld, failures: u32) {
    world.config.polling.stale_after_failures = failures;
}

#[when("the job listing is polled")]
async fn poll_jobs(world: &mut JenkinsMonitorWorld) {
    let health = world.poller().poll_once().await;
    world.last_health = Some(health);
}

#[when("the server becomes unreachable")]
fn server_unreachable(world: &mut JenkinsMonitorWorld) {
    world.source.set_jobs(Err(FetchErrorKind::Unreachable));
    world.source.set_feed(Err(FetchErrorKind::Unreachable));
}

#[when("the server rejects the credentials")]
fn server_rejects_credentials(world: &mut JenkinsMonitorWorld) {
    world.source.set_jobs(Err(FetchErrorKind::AuthFailed));
    world.source.set_feed(Err(FetchErrorKind::AuthFailed));
    world.source.fail_verify(FetchErrorKind::AuthFailed);
}

#[when("the server recovers")]
fn server_recovers(world: &mut JenkinsMonitorWorld) {
    let jobs = listing(world);
    world.source.set_jobs(Ok(jobs));
    world.source.set_feed(Ok(world.feed.clone()));
}

#[then(expr = "the aggregated health should be {string}")]
fn health_is(world: &mut JenkinsMonitorWorld, status: String) {
    let health = world.last_health.expect("no job listing polled");
    assert_eq!(health.status, parse_status(&status));
}

#[then("the aggregated health should be current")]
fn health_is_current(world: &mut JenkinsMonitorWorld) {
    let health = world.last_health.expect("no job listing polled");
    assert!(!health.stale);
}

#[then("the aggregated health should be stale")]
fn health_is_stale(world: &mut JenkinsMonitorWorld) {
    let health = world.last_health.expect("no job listing polled");
    assert!(health.stale);
}

#[then(expr = "the job table should contain {int} job(s)")]
fn table_contains(world: &mut JenkinsMonitorWorld, count: usize) {
    assert_eq!(world.poller().table().len(), count);
}

#[then(expr = "the listener should have received {int} health update(s)")]
fn health_updates(world: &mut JenkinsMonitorWorld, count: usize) {
    assert_eq!(world.status.count(), count);
}
