//! Kani proof harnesses for the node chain and the stack.
//!
//! Bounded model checking of the sequential laws for all inputs up to a
//! bound.
//!
//! # Running the proofs
//!
//! ```bash
//! cargo kani -p tss-stack
//! cargo kani -p tss-stack --harness proof_lifo_order
//! ```
//!
//! Kani does not execute threads. Interleavings of the guard are covered
//! by the loom tests and by the stateright model.

#[cfg(kani)]
mod proofs {
    use crate::error::EmptyStack;
    use crate::Stack;

    /// Pop returns the value that was just pushed, including zero.
    #[kani::proof]
    #[kani::unwind(4)]
    fn proof_pop_returns_pushed_value() {
        let stack = Stack::new();
        let value: u64 = kani::any();

        kani::assert(stack.push(value).is_ok(), "push must succeed");
        kani::assert(stack.pop() == Ok(value), "pop must return the pushed value");
    }

    /// Last in, first out for two arbitrary values.
    #[kani::proof]
    #[kani::unwind(4)]
    fn proof_lifo_order() {
        let stack = Stack::new();
        let v1: u64 = kani::any();
        let v2: u64 = kani::any();

        let _ = stack.push(v1);
        let _ = stack.push(v2);

        kani::assert(stack.pop() == Ok(v2), "second pushed must be popped first");
        kani::assert(stack.pop() == Ok(v1), "first pushed must be popped second");
        kani::assert(stack.pop() == Err(EmptyStack), "stack must then be empty");
    }

    /// An empty pop never yields data and never changes the stack.
    #[kani::proof]
    #[kani::unwind(3)]
    fn proof_empty_pop_leaves_stack_usable() {
        let stack = Stack::new();
        kani::assert(stack.pop() == Err(EmptyStack), "empty pop must be an error");
        kani::assert(stack.is_empty(), "empty pop must not mutate");

        let value: u64 = kani::any();
        let _ = stack.push(value);
        kani::assert(stack.pop() == Ok(value), "push after empty pop must round-trip");
    }

    /// Length tracks pushes minus successful pops for any sequence.
    #[kani::proof]
    #[kani::unwind(7)]
    fn proof_len_matches_operations() {
        let stack = Stack::new();
        let mut expected: usize = 0;

        for i in 0..5u64 {
            if kani::any() {
                let _ = stack.push(i);
                expected += 1;
            } else if stack.pop().is_ok() {
                expected -= 1;
            }
        }

        kani::assert(stack.len() == expected, "len must equal pushes minus pops");
    }

    /// Drain empties any bounded stack and a second drain releases nothing.
    #[kani::proof]
    #[kani::unwind(6)]
    fn proof_drain_idempotent() {
        let stack = Stack::new();
        let n: u8 = kani::any();
        kani::assume(n <= 4);

        for i in 0..n {
            let _ = stack.push(i);
        }

        kani::assert(stack.drain() == n as usize, "drain must release every node");
        kani::assert(stack.is_empty(), "stack must be empty after drain");
        kani::assert(stack.drain() == 0, "second drain must be a no-op");
    }
}
