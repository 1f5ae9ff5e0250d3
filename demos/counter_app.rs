//! Counter view-model demonstrating properties, commands, bindings and
//! interactions together

use rx_viewmodel::{
    Activable, Error, Interaction, Property, ReactiveCommand, ReactiveProperty, Subject, ViewModel,
};
use std::thread;
use std::time::Duration;

struct CounterViewModel {
    vm: ViewModel,
    count: Property<i32>,
    step: Property<i32>,
    history: Property<Vec<i32>>,
    is_positive: Property<bool>,
    increment: ReactiveCommand<(), i32>,
    reset: ReactiveCommand<(), i32>,
    confirm_reset: Interaction<i32, bool>,
}

impl CounterViewModel {
    fn new() -> Self {
        let vm = ViewModel::with_error_handler(|e| println!("   [Error] {e}"));
        let count = vm.create_property(0);
        let step = vm.create_property(1);
        let history = vm.create_property(vec![0]);
        let is_positive = count.map(|c| c > 0);
        let confirm_reset = vm.create_interaction();

        let increment = {
            let (count, step) = (count.clone(), step.clone());
            vm.command_builder::<(), i32>().build_fn(move |_| {
                let next = count.value().unwrap_or(0) + step.value().unwrap_or(1);
                count.set_value(next)?;
                Ok(next)
            })
        };

        let reset = {
            let (count, confirm) = (count.clone(), confirm_reset.clone());
            vm.command_builder::<(), i32>()
                .can_execute(is_positive.as_observable())
                .build(move |_| {
                    let count = count.clone();
                    confirm
                        .request(count.value().unwrap_or(0))
                        .map(move |confirmed: bool| {
                            if confirmed {
                                let _ = count.set_value(0);
                            }
                            count.value().unwrap_or(0)
                        })
                })
        };

        let log = history.clone();
        vm.when(count.as_observable()).then_consume(move |c| {
            log.update_value(|h| {
                let mut h = h.unwrap_or_default();
                if h.last() != Some(&c) {
                    h.push(c);
                }
                h
            })
        });

        Self {
            vm,
            count,
            step,
            history,
            is_positive,
            increment,
            reset,
            confirm_reset,
        }
    }
}

fn main() {
    println!("=== Counter View-Model ===\n");

    println!("1. Building the view-model");
    let counter = CounterViewModel::new();

    println!("\n2. Attaching a view");
    let clicks: Subject<()> = Subject::new();
    let on_click = {
        let increment = counter.increment.clone();
        counter.vm.when(clicks.as_observable()).then_switch(move |_| increment.execute())
    };
    let _display = counter.count.as_observable().subscribe(|c| println!("   [View] Count: {c}"));
    let _dialog = counter.confirm_reset.as_observable().subscribe(|request| {
        let current = request.input().copied().unwrap_or(0);
        println!("   [Dialog] Reset counter at {current}? yes");
        let _ = request.handle(true);
    });
    counter.vm.activate();
    println!("   Activated: {}", on_click.is_activated());

    println!("\n3. Clicking");
    for _ in 0..3 {
        clicks.next(());
    }

    println!("\n4. Changing the step");
    counter.step.set_value(5).unwrap();
    clicks.next(());
    println!("   Positive: {:?}", counter.is_positive.value());

    println!("\n5. Writing to a derived property");
    match counter.is_positive.set_value(false) {
        Err(Error::ReadOnlyProperty) => println!("   is_positive is read-only"),
        other => println!("   unexpected: {other:?}"),
    }

    println!("\n6. Resetting in the background");
    let background = counter.reset.clone();
    let worker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        background.execute().subscribe(|c| println!("   [Reset] Count is now {c}"));
    });
    let _ = worker.join();

    println!("\n7. Detaching the view");
    counter.vm.deactivate();
    clicks.next(());
    println!("   Click ignored, count: {:?}", counter.count.value());

    println!("\n8. Summary");
    println!("   History: {:?}", counter.history.value().unwrap_or_default());
    println!("   Increments: {:?}", counter.increment.execution_count().value());
    println!("   Can reset: {:?}", counter.reset.can_execute().value());

    println!("\n=== Done ===");
}
