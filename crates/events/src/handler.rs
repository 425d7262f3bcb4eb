/// Execute an aggregate command deterministically (no IO, no async).
///
/// 1. `aggregate.handle(command)` decides the events without mutating.
/// 2. Each event is applied in order via `aggregate.apply(event)`.
///
/// The events are returned so the caller can persist the aggregate and
/// dispatch them. If `handle` fails, the aggregate is untouched.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: allocation_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
