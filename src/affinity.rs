// CPU AFFINITY MASKS
// A RUN WITH T THREADS IS PINNED TO LOGICAL CPUS 0..T-1.
//
// CONTIGUOUS LOW RANGE ONLY: NUMA NODES AND HYPERTHREAD SIBLINGS ARE NOT
// CONSIDERED. ON SMT MACHINES CPU N AND N+1 MAY SHARE A PHYSICAL CORE.

use std::fmt;

// LARGEST CPU INDEX + 1 THAT A cpu_set_t CAN EXPRESS
pub const MAX_CPUS: usize = libc::CPU_SETSIZE as usize;

const WORD_BITS: usize = 64;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CpuMask {
    // WORD 0 HOLDS CPUS 0..63, WORD 1 HOLDS 64..127, ...
    words: Vec<u64>,
}

impl CpuMask {
    /// Mask selecting the first `threads` logical CPUs.
    ///
    /// `threads` must already be validated (`1..=MAX_CPUS`); see
    /// `SweepParameters::validate`.
    pub fn first_n(threads: usize) -> Self {
        let full = threads / WORD_BITS;
        let rem = threads % WORD_BITS;
        let mut words = vec![u64::MAX; full];
        if rem > 0 {
            words.push((1u64 << rem) - 1);
        }
        Self { words }
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn contains(&self, cpu: usize) -> bool {
        self.words
            .get(cpu / WORD_BITS)
            .map(|w| w & (1u64 << (cpu % WORD_BITS)) != 0)
            .unwrap_or(false)
    }

    pub fn cpus(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.words.len() * WORD_BITS).filter(move |&cpu| self.contains(cpu))
    }

    // taskset STYLE: 0x PREFIX, NO LEADING ZEROS
    pub fn to_hex(&self) -> String {
        let mut hex = String::from("0x");
        let mut started = false;
        for w in self.words.iter().rev() {
            if started {
                hex.push_str(&format!("{:016x}", w));
            } else if *w != 0 {
                hex.push_str(&format!("{:x}", w));
                started = true;
            }
        }
        if !started {
            hex.push('0');
        }
        hex
    }

    // BUILT IN THE PARENT SO THE CHILD ONLY HAS TO MAKE THE SYSCALL
    pub fn to_cpu_set(&self) -> libc::cpu_set_t {
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        for cpu in self.cpus().take_while(|&c| c < MAX_CPUS) {
            unsafe { libc::CPU_SET(cpu, &mut set) };
        }
        set
    }
}

impl fmt::Display for CpuMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// APPLY A PREBUILT SET TO THE CALLING PROCESS. ASYNC-SIGNAL-SAFE (ONE SYSCALL),
// SO IT IS USABLE BETWEEN fork AND exec.
pub fn apply_cpu_set(set: &libc::cpu_set_t) -> std::io::Result<()> {
    let ret = unsafe {
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set)
    };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
