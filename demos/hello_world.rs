use phalanx::prelude::*;
use std::sync::Arc;

struct Greeter {
    updates: u64,
}

impl System for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    fn on_start(&mut self, world: &World) -> SystemResult {
        world.log(LogLevel::Info, "hello from the greeter");
        Ok(())
    }

    fn on_update(&mut self, _world: &World, _iter: &Iteration) -> SystemResult {
        self.updates += 1;
        Ok(())
    }

    fn on_stop(&mut self, world: &World, iter: &Iteration) -> SystemResult {
        world.log(
            LogLevel::Info,
            &format!("goodbye after {} updates in {:.2} s", self.updates, iter.time),
        );
        Ok(())
    }
}

fn main() {
    let world = World::new("hello", LogLevel::Info, Arc::new(StreamLogger::stdout()));
    world.add_system(Greeter { updates: 0 });

    // ten iterations per second, for half a second
    world.run(10.0, 0.5);
}
