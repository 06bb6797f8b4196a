use state_machines::state_machine;

state_machine! {
    name: GraphIngestionMachine,
    state: GraphIngestionState,
    initial: Ready,
    states: [Ready, Sampled, Enriched, Persisted, Failed],
    events {
        sample { transition: { from: Ready, to: Sampled } }
        enrich { transition: { from: Sampled, to: Enriched } }
        persist { transition: { from: Enriched, to: Persisted } }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: Sampled, to: Failed }
            transition: { from: Enriched, to: Failed }
            transition: { from: Persisted, to: Failed }
        }
    }
}

pub fn ready() -> GraphIngestionMachine<(), Ready> {
    GraphIngestionMachine::new(())
}
