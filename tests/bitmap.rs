use amiga_fs::{
    disk::{
        types::{DiskDensity, DiskDiameter},
        BlockStore,
    },
    fs::{Block, BlockType, Device, VolumeType},
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Allocate,
    Deallocate(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Allocate),
        1 => any::<usize>().prop_map(Op::Deallocate),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// 任意分配 / 释放序列之后：isFree(nr) == (类型为 Empty)
    #[test]
    fn bitmap_matches_block_types(ops in proptest::collection::vec(op(), 1..200), ffs in any::<bool>()) {
        let dos = if ffs { VolumeType::Ffs } else { VolumeType::Ofs };
        let mut device = Device::make_with_floppy(DiskDiameter::Inch35, DiskDensity::Dd, dos).unwrap();
        let p = device.current_partition().clone();
        let data = if ffs { BlockType::DataFfs } else { BlockType::DataOfs };
        let mut allocated = Vec::new();

        for op in ops {
            match op {
                Op::Allocate => {
                    let nr = p.allocate_block(&mut device);
                    prop_assert_ne!(nr, 0);
                    device.replace(Block::make_with_type(&p, nr, data).unwrap()).unwrap();
                    allocated.push(nr);
                }
                Op::Deallocate(i) if !allocated.is_empty() => {
                    let nr = allocated.swap_remove(i % allocated.len());
                    p.deallocate_block(&mut device, nr).unwrap();
                }
                Op::Deallocate(_) => {}
            }
        }

        for nr in p.first_block + 2..=p.last_block {
            prop_assert_eq!(p.is_free(&device, nr), device.block_type(nr) == BlockType::Empty);
        }
        prop_assert_eq!(p.check(&device), 0);
        prop_assert_eq!(device.free_blocks(), 1756 - allocated.len());
    }
}
