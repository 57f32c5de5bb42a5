// src/player/property.rs
//
// Observable value backed by a `watch` channel.
// Readers get the latest value; subscribers wake on every publish.

use std::fmt::Debug;
use tokio::sync::watch;

pub struct Property<T> {
    sender: watch::Sender<T>,
    name: &'static str,
}

impl<T: Clone + Send + Sync> Property<T> {
    pub fn new(initial_value: T, name: &'static str) -> Self {
        let (sender, _) = watch::channel(initial_value);
        Self { sender, name }
    }

    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    pub fn set(&self, new_value: T) {
        self.sender.send_replace(new_value);
    }

    pub fn update<F>(&self, updater: F)
    where
        F: FnOnce(&mut T),
    {
        self.sender.send_modify(updater);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: PartialEq + Clone + Send + Sync> Property<T> {
    /// Publish only when the value differs; returns whether it changed
    pub fn set_if_changed(&self, new_value: T) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == new_value {
                false
            } else {
                *current = new_value;
                true
            }
        })
    }
}

impl<T: Debug> Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Property({}: {:?})", self.name, *self.sender.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_wakes_on_set() {
        let property = Property::new(0u32, "level");
        let mut rx = property.subscribe();

        property.set(5);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 5);
    }

    #[test]
    fn test_set_if_changed_skips_equal_values() {
        let property = Property::new(true, "flag");
        let rx = property.subscribe();

        assert!(!property.set_if_changed(true));
        assert!(!rx.has_changed().unwrap());

        assert!(property.set_if_changed(false));
        assert!(rx.has_changed().unwrap());
    }
}
